//! # cv-harness
//!
//! Question answering over a small corpus of CVs.
//!
//! Every CV is split into labelled chunks and stored in its own retrieval
//! namespace. A question is matched to the person (or people) it names via
//! an alias table, their namespaces are searched, and the results are
//! formatted into a prompt in the language the question was asked in.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌──────────────────┐
//! │  extract   │──▶│  registry   │──▶│ namespace/store  │
//! │ PDF / DOCX │   │ chunk+alias │   │ memory / SQLite  │
//! └────────────┘   └──────┬──────┘   └────────▲─────────┘
//!                         │                   │
//!                  ┌──────▼──────┐            │
//!  query ─────────▶│  resolver   │────────────┘
//!                  │ names+lang  │──▶ prompt ──▶ llm ──▶ answer
//!                  └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cvh entities                       # load ./data/cvs and list people
//! cvh prompt "What is Ana's experience?"
//! cvh ask "¿Qué estudió Carlos?"
//! cvh chat
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Labels, chunks, and retrieval results |
//! | [`error`] | Error taxonomy |
//! | [`chunk`] | CV segmentation and keyword classification |
//! | [`language`] | Language detection, prompt templates, user messages |
//! | [`normalize`] | Accent folding for names and tokens |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store abstraction (memory, SQLite) |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`namespace`] | Per-person retrieval namespaces |
//! | [`llm`] | Chat completion providers |
//! | [`names`] | Name and mention extraction |
//! | [`registry`] | Entities, aliases, default entity |
//! | [`resolver`] | Query resolution and prompt assembly |
//! | [`assistant`] | Registration and answering entry point |
//! | [`extract`] | Text extraction from PDF and DOCX |
//! | [`ingest`] | CV directory loading |

pub mod assistant;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod language;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod names;
pub mod namespace;
pub mod normalize;
pub mod registry;
pub mod resolver;
pub mod store;
