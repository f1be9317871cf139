//! One-shot startup pipeline.
//!
//! ```text
//! scan ──▶ engines (tabular, document) ──▶ descriptions ──▶ catalog ──▶ agent
//! ```
//!
//! [`build_agent`] runs the steps in order on the calling task.
//! [`Startup`] runs them on a background task and exposes the two-state
//! machine: no agent until the pipeline succeeds, and no way back to
//! `Uninitialized` short of a restart. A failed startup stays without an
//! agent for good.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::agent::{assemble, Agent};
use crate::catalog::build_catalog;
use crate::config::Config;
use crate::engine::EngineFactory;
use crate::error::FolioError;
use crate::llm::LlmClient;
use crate::models::SourceKind;
use crate::notes::NoteSink;
use crate::progress::{StartupEvent, StartupReporter};

/// Run the full pipeline and return the assembled agent.
pub async fn build_agent(
    config: Arc<Config>,
    llm: Arc<dyn LlmClient>,
    reporter: &dyn StartupReporter,
) -> Result<Box<dyn Agent>> {
    let result = run_steps(config, llm, reporter).await;
    match &result {
        Ok(agent) => reporter.report(StartupEvent::Ready {
            tools: agent.tools().len(),
        }),
        Err(e) => {
            tracing::error!("startup failed: {:#}", e);
            reporter.report(StartupEvent::Failed {
                error: format!("{:#}", e),
            });
        }
    }
    result
}

async fn run_steps(
    config: Arc<Config>,
    llm: Arc<dyn LlmClient>,
    reporter: &dyn StartupReporter,
) -> Result<Box<dyn Agent>> {
    let factory = EngineFactory::new(config.clone(), llm.clone());

    let tabular = factory.build(SourceKind::Tabular, reporter).await?;
    tracing::info!(
        engines = tabular.iter().flatten().count(),
        "tabular engines created"
    );
    let document = factory.build(SourceKind::Document, reporter).await?;
    tracing::info!(
        engines = document.iter().flatten().count(),
        skipped = document.iter().filter(|e| e.is_none()).count(),
        "document engines created"
    );

    let notes = Arc::new(NoteSink::from_config(&config.notes));
    let tools = build_catalog(tabular, document, llm.clone(), notes, reporter)
        .await
        .context("failed to build tool catalog")?;

    assemble(
        tools,
        llm,
        &config.agent.context,
        config.agent.max_iterations,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupState {
    Uninitialized,
    Ready,
    Failed(String),
}

impl StartupState {
    /// Whether queries may be accepted.
    pub fn is_ready(&self) -> bool {
        matches!(self, StartupState::Ready)
    }
}

/// The pipeline running on a background task.
pub struct Startup {
    state: watch::Receiver<StartupState>,
    handle: JoinHandle<Result<Box<dyn Agent>>>,
}

impl Startup {
    pub fn spawn(
        config: Arc<Config>,
        llm: Arc<dyn LlmClient>,
        reporter: Arc<dyn StartupReporter>,
    ) -> Self {
        let (tx, rx) = watch::channel(StartupState::Uninitialized);
        let handle = tokio::spawn(async move {
            let result = build_agent(config, llm, reporter.as_ref()).await;
            let next = match &result {
                Ok(_) => StartupState::Ready,
                Err(e) => StartupState::Failed(format!("{:#}", e)),
            };
            let _ = tx.send(next);
            result
        });
        Self { state: rx, handle }
    }

    pub fn state(&self) -> StartupState {
        self.state.borrow().clone()
    }

    /// Wait for the pipeline. A failed startup yields [`FolioError::NotReady`]
    /// with the cause attached.
    pub async fn wait(self) -> Result<Box<dyn Agent>> {
        match self.handle.await {
            Ok(result) => result.context(FolioError::NotReady),
            Err(join_err) => Err(anyhow::Error::new(join_err).context(FolioError::NotReady)),
        }
    }
}
