//! # Folio CLI (`folio`)
//!
//! ## Usage
//!
//! ```bash
//! folio --config ./config/folio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio chat` | Build the agent, then read prompts until `q` |
//! | `folio ask "<prompt>"` | Build the agent and answer one prompt |
//! | `folio tools` | Build the agent and list its tools |
//! | `folio index [--rebuild]` | Build or load every document index |
//! | `folio note "<text>" [--title T]` | Append a note |
//! | `folio completions <shell>` | Print shell completions |

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use folio::config::{self, Config};
use folio::extract::load_document;
use folio::index::{IndexResolver, IndexStore};
use folio::llm::create_client;
use folio::models::SourceKind;
use folio::notes::{NoteContent, NoteSink};
use folio::pipeline::Startup;
use folio::progress::ProgressMode;
use folio::session::{run_repl, Session};
use folio::sources::scan_sources;

/// Folio: ask questions over local CSV and PDF files.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/folio.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "folio",
    about = "Ask natural-language questions over local CSV and PDF files",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/folio.toml")]
    config: PathBuf,

    /// Startup progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    /// Debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive conversation. Enter `q` to quit.
    Chat,

    /// Answer a single prompt and exit.
    Ask {
        prompt: String,
    },

    /// List the tools the agent was built with.
    Tools,

    /// Build or load the index of every document source.
    ///
    /// Existing indices are loaded as-is, even if the source changed.
    /// `--rebuild` deletes them first.
    Index {
        #[arg(long)]
        rebuild: bool,
    },

    /// Append a note to the note file.
    Note {
        text: String,

        #[arg(long)]
        title: Option<String>,
    },

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    folio::logging::init(cli.verbose);

    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "folio", &mut std::io::stdout());
        }
        Commands::Note { text, title } => {
            // Notes work without a config file
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            save_note(&cfg, &text, title.as_deref())?;
        }
        Commands::Index { rebuild } => {
            let cfg = config::load_config(&cli.config)?;
            index_documents(&cfg, rebuild).await?;
        }
        Commands::Chat => {
            let cfg = Arc::new(config::load_config(&cli.config)?);
            let agent = start(&cfg, progress).await?;
            let mut session = Session::new(agent, cfg.agent.history_capacity);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_repl(&mut session, stdin, &mut std::io::stdout()).await?;
        }
        Commands::Ask { prompt } => {
            let cfg = Arc::new(config::load_config(&cli.config)?);
            let agent = start(&cfg, progress).await?;
            let mut session = Session::new(agent, cfg.agent.history_capacity);
            println!("{}", session.ask(&prompt).await);
        }
        Commands::Tools => {
            let cfg = Arc::new(config::load_config(&cli.config)?);
            let agent = start(&cfg, progress).await?;
            for tool in agent.tools().tools() {
                println!("{}\n    {}", tool.name(), tool.description());
            }
        }
    }

    Ok(())
}

async fn start(cfg: &Arc<Config>, progress: ProgressMode) -> Result<Box<dyn folio::agent::Agent>> {
    let llm = create_client(&cfg.llm)?;
    Startup::spawn(cfg.clone(), llm, progress.reporter())
        .wait()
        .await
}

fn save_note(cfg: &Config, text: &str, title: Option<&str>) -> Result<()> {
    let note = match title {
        Some(t) => NoteContent::Structured {
            title: Some(t.to_string()),
            content: text.to_string(),
        },
        None => NoteContent::Plain(text.to_string()),
    };
    let receipt = NoteSink::from_config(&cfg.notes).save(&note)?;
    println!(
        "note saved to {} at {}",
        receipt.path.display(),
        receipt.timestamp.to_rfc3339()
    );
    Ok(())
}

async fn index_documents(cfg: &Config, rebuild: bool) -> Result<()> {
    let resolver = IndexResolver::new(
        IndexStore::new(cfg.index.dir.clone()),
        cfg.chunking.max_tokens,
        cfg.embedding.clone(),
    );

    let sources = scan_sources(cfg, SourceKind::Document)?;
    if sources.is_empty() {
        println!("No document sources found.");
        return Ok(());
    }

    let mut failed = 0;
    for source in &sources {
        if rebuild && resolver.store().remove(&source.logical_name)? {
            tracing::info!(index = %source.logical_name, "removed index for rebuild");
        }

        let outcome = match load_document(&source.path) {
            Ok(docs) => resolver
                .resolve_with_outcome(&docs, &source.logical_name)
                .await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok((handle, resolution)) => println!(
                "{:<8} {} ({} chunks)",
                resolution.as_str(),
                source.logical_name,
                handle.manifest.chunk_count
            ),
            Err(e) => {
                failed += 1;
                println!("{:<8} {} ({})", "failed", source.logical_name, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} document indices failed", failed, sources.len());
    }
    Ok(())
}
