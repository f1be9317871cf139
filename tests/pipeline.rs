//! End-to-end tests of the startup pipeline with a scripted LLM.
//!
//! Covers: catalog shape for one CSV plus one PDF, engine counts with
//! non-matching files mixed in, persisted indices surviving a changed
//! source, and a full session that calls tools through the agent.

use anyhow::Result;
use async_trait::async_trait;
use folio::config::Config;
use folio::engine::EngineFactory;
use folio::index::IndexStore;
use folio::llm::LlmClient;
use folio::models::SourceKind;
use folio::pipeline::build_agent;
use folio::progress::{StartupEvent, StartupReporter};
use folio::session::Session;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Replays canned agent steps and records every prompt.
///
/// Description and engine prompts get fixed replies; agent prompts
/// (recognized by the tool listing) consume `agent_steps` in order and
/// fall back to a final answer once the queue is empty.
struct ScriptedLlm {
    agent_steps: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(steps: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            agent_steps: Mutex::new(steps.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("You have access to the following tools") {
            let next = self.agent_steps.lock().unwrap().pop_front();
            return Ok(next.unwrap_or_else(|| "Answer: done".to_string()));
        }
        if prompt.starts_with("Based on the following content") {
            return Ok("Scripted description.".to_string());
        }
        Ok("Scripted engine reply.".to_string())
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<StartupEvent>>,
}

impl StartupReporter for Recorder {
    fn report(&self, event: StartupEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Minimal valid PDF containing `phrase`, with correct xref offsets so
/// pdf-extract can parse it.
fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn config_in(root: &Path) -> Config {
    let mut config = Config::minimal();
    config.data.root = root.join("data");
    config.index.dir = root.join("storage");
    config.notes.path = root.join("data").join("notes.csv");
    config
}

/// `data/csv/pop.csv` and `data/pdf/canada.pdf`.
fn setup_pop_and_canada() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path());

    let csv_dir = config.data.folder(SourceKind::Tabular);
    let pdf_dir = config.data.folder(SourceKind::Document);
    fs::create_dir_all(&csv_dir).unwrap();
    fs::create_dir_all(&pdf_dir).unwrap();
    fs::write(
        csv_dir.join("pop.csv"),
        "country,population\nIndia,1428627663\nChina,1425671352\nCanada,38781291\n",
    )
    .unwrap();
    fs::write(
        pdf_dir.join("canada.pdf"),
        minimal_pdf("Ottawa is the capital of Canada"),
    )
    .unwrap();

    (tmp, config)
}

#[tokio::test]
async fn csv_and_pdf_yield_three_tools_in_order() {
    let (tmp, config) = setup_pop_and_canada();
    let llm = ScriptedLlm::new(&[]);
    let reporter = Recorder::default();

    let agent = build_agent(Arc::new(config), llm.clone(), &reporter)
        .await
        .unwrap();

    assert_eq!(
        agent.tools().names(),
        vec!["tabular_data_1", "document_data_1", "note_saver"]
    );
    assert_eq!(
        agent.tools().find("document_data_1").unwrap().description(),
        "This tool provides insights from PDF data file 1. Scripted description."
    );
    assert!(tmp.path().join("storage").join("canada").join("manifest.json").is_file());

    let prompts = llm.prompts();
    assert!(prompts
        .iter()
        .any(|p| p.contains("Based on the following content from CSV data file 1")));
    assert!(prompts
        .iter()
        .any(|p| p.contains("Based on the following content from PDF data file 1")));

    let events = reporter.events.lock().unwrap();
    assert_eq!(events.last(), Some(&StartupEvent::Ready { tools: 3 }));
}

#[tokio::test]
async fn engine_count_ignores_non_matching_files() {
    for (n, m) in [(0usize, 3usize), (2, 0), (3, 2)] {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        let csv_dir = config.data.folder(SourceKind::Tabular);
        fs::create_dir_all(&csv_dir).unwrap();

        // Interleave names so non-matching files sort between matching ones.
        for i in 0..n {
            fs::write(csv_dir.join(format!("t{}.csv", i)), "a,b\n1,2\n").unwrap();
        }
        for i in 0..m {
            fs::write(csv_dir.join(format!("t{}.txt", i)), "not a table").unwrap();
        }
        fs::create_dir_all(csv_dir.join("nested.csv")).unwrap();

        let factory = EngineFactory::new(Arc::new(config), ScriptedLlm::new(&[]));
        let reporter = Recorder::default();
        let engines = factory.build(SourceKind::Tabular, &reporter).await.unwrap();

        assert_eq!(engines.len(), n, "n={} m={}", n, m);
    }
}

#[tokio::test]
async fn persisted_index_survives_changed_source() {
    let (tmp, config) = setup_pop_and_canada();
    let config = Arc::new(config);
    build_agent(config.clone(), ScriptedLlm::new(&[]), &Recorder::default())
        .await
        .unwrap();

    let store = IndexStore::new(tmp.path().join("storage"));
    let first = store.load("canada").unwrap();

    fs::write(
        config.data.folder(SourceKind::Document).join("canada.pdf"),
        minimal_pdf("Toronto is the largest city in Canada"),
    )
    .unwrap();
    build_agent(config.clone(), ScriptedLlm::new(&[]), &Recorder::default())
        .await
        .unwrap();

    let second = store.load("canada").unwrap();
    assert_eq!(first.index.chunks, second.index.chunks);
    assert_eq!(first.manifest.built_at, second.manifest.built_at);

    // Deleting the directory is the only way to force a rebuild.
    assert!(store.remove("canada").unwrap());
    build_agent(config, ScriptedLlm::new(&[]), &Recorder::default())
        .await
        .unwrap();
    let third = store.load("canada").unwrap();
    assert_ne!(first.manifest.fingerprint, third.manifest.fingerprint);
}

#[tokio::test]
async fn session_routes_prompts_through_tools() {
    let (tmp, config) = setup_pop_and_canada();
    let llm = ScriptedLlm::new(&[
        "Thought: I need the table.\nAction: tabular_data_1\nAction Input: {\"input\": \"largest population\"}",
        "Thought: I can answer without using any more tools.\nAnswer: India.",
        "Thought: Save it.\nAction: note_saver\nAction Input: {\"title\": \"pop\", \"content\": \"India is largest\"}",
        "Answer: Saved.",
    ]);
    let agent = build_agent(Arc::new(config), llm.clone(), &Recorder::default())
        .await
        .unwrap();
    let mut session = Session::new(agent, 5);

    assert_eq!(session.ask("Which country is largest?").await, "India.");
    assert_eq!(session.ask("Save that as a note").await, "Saved.");

    let prompts = llm.prompts();
    assert!(prompts
        .iter()
        .any(|p| p.contains("| India | 1428627663 |") && p.ends_with("Question: largest population")));
    assert!(prompts
        .iter()
        .any(|p| p.contains("Observation: note saved")));
    let last_agent_prompt = prompts
        .iter()
        .find(|p| p.contains("New prompt: Save that as a note"))
        .unwrap();
    assert!(last_agent_prompt.contains("Prompt: Which country is largest?\nResponse: India."));

    let notes = fs::read_to_string(tmp.path().join("data").join("notes.csv")).unwrap();
    assert!(notes.starts_with("timestamp,title,content\n"));
    assert!(notes.contains(",pop,pop: India is largest"));
}

#[tokio::test]
async fn agent_failure_text_is_the_answer() {
    let (_tmp, mut config) = setup_pop_and_canada();
    config.agent.max_iterations = 1;
    let llm = ScriptedLlm::new(&["Thought: t\nAction: tabular_data_1\nAction Input: {\"input\": \"x\"}"]);
    let agent = build_agent(Arc::new(config), llm, &Recorder::default())
        .await
        .unwrap();
    let mut session = Session::new(agent, 5);

    let answer = session.ask("anything").await;
    assert_eq!(answer, "Reached max iterations (1) without an answer");
    assert_eq!(session.history().len(), 1);
}
