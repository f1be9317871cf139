//! Startup progress reporting.
//!
//! Building the agent can take a while (PDF extraction, index builds, one
//! LLM call per tool description), so the startup pipeline emits progress
//! events. They are written to **stderr** so stdout stays parseable.

use std::io::Write;
use std::sync::Arc;

use crate::models::SourceKind;

/// A single startup progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum StartupEvent {
    /// Listing a kind's folder.
    Scanning { kind: SourceKind },
    /// One source processed: `n` of `total` for this kind.
    Engine {
        kind: SourceKind,
        n: usize,
        total: usize,
        name: String,
        ok: bool,
    },
    /// Generating the description for a tool.
    Describing { tool: String },
    /// Agent assembled with this many tools.
    Ready { tools: usize },
    /// Startup aborted.
    Failed { error: String },
}

/// Receives startup events from the pipeline.
pub trait StartupReporter: Send + Sync {
    fn report(&self, event: StartupEvent);
}

/// Human-friendly lines on stderr: `startup  pdf  2 / 3  canada  ok`.
pub struct StderrProgress;

impl StartupReporter for StderrProgress {
    fn report(&self, event: StartupEvent) {
        let line = match &event {
            StartupEvent::Scanning { kind } => format!("startup  scanning {} sources...\n", kind),
            StartupEvent::Engine {
                kind,
                n,
                total,
                name,
                ok,
            } => format!(
                "startup  {}  {} / {}  {}  {}\n",
                kind,
                n,
                total,
                name,
                if *ok { "ok" } else { "skipped" }
            ),
            StartupEvent::Describing { tool } => format!("startup  describing {}\n", tool),
            StartupEvent::Ready { tools } => format!("startup  ready ({} tools)\n", tools),
            StartupEvent::Failed { error } => format!("startup  failed: {}\n", error),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl StartupReporter for JsonProgress {
    fn report(&self, event: StartupEvent) {
        let obj = to_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn to_json(event: &StartupEvent) -> serde_json::Value {
    match event {
        StartupEvent::Scanning { kind } => serde_json::json!({
            "event": "progress",
            "phase": "scanning",
            "kind": kind,
        }),
        StartupEvent::Engine {
            kind,
            n,
            total,
            name,
            ok,
        } => serde_json::json!({
            "event": "progress",
            "phase": "engines",
            "kind": kind,
            "n": n,
            "total": total,
            "name": name,
            "ok": ok,
        }),
        StartupEvent::Describing { tool } => serde_json::json!({
            "event": "progress",
            "phase": "describing",
            "tool": tool,
        }),
        StartupEvent::Ready { tools } => serde_json::json!({
            "event": "ready",
            "tools": tools,
        }),
        StartupEvent::Failed { error } => serde_json::json!({
            "event": "failed",
            "error": error,
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl StartupReporter for NoProgress {
    fn report(&self, _event: StartupEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn StartupReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
