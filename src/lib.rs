//! # Folio
//!
//! Ask natural-language questions over a folder of local CSV and PDF files.
//!
//! Every data file becomes a named, described tool; a reasoning agent
//! picks tools to answer each prompt. Document files are indexed once and
//! the index is persisted, so later runs load it instead of rebuilding.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ data/csv/*   │──▶│ TabularEngine│──▶│              │   │          │
//! └──────────────┘   └──────────────┘   │ ToolRegistry │──▶│ ReAct    │
//! ┌──────────────┐   ┌──────────────┐   │ + note_saver │   │ agent    │
//! │ data/pdf/*   │──▶│ IndexResolver│──▶│              │   │          │
//! └──────────────┘   │ DocumentEngine   └──────────────┘   └────┬─────┘
//!                    └──────┬───────┘                           │
//!                           ▼                                   ▼
//!                    storage/<name>/                     Session (history)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! folio index                   # build or load document indices
//! folio tools                   # list generated tools
//! folio ask "Which country has the largest population?"
//! folio chat                    # interactive loop, `q` to quit
//! folio note "call Alice" --title todo
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`sources`] | Folder scanning |
//! | [`extract`] | Document text extraction |
//! | [`table`] | CSV tables and column profiles |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persisted indices: store and resolver |
//! | [`llm`] | LLM client abstraction |
//! | [`engine`] | Query engines and the engine factory |
//! | [`describe`] | Tool description generation |
//! | [`notes`] | Append-only note sink |
//! | [`catalog`] | Tools and the tool catalog |
//! | [`agent`] | ReAct agent |
//! | [`history`] | Bounded conversation history |
//! | [`progress`] | Startup progress reporting |
//! | [`pipeline`] | Startup pipeline and state |
//! | [`session`] | Conversation loop |
//! | [`logging`] | `tracing` subscriber setup |

pub mod agent;
pub mod catalog;
pub mod chunk;
pub mod config;
pub mod describe;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod history;
pub mod index;
pub mod llm;
pub mod logging;
pub mod models;
pub mod notes;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod sources;
pub mod table;
