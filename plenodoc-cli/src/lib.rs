//! # plenodoc-cli
//!
//! The `plenodoc` command: manage the knowledge base and chat with it.
//!
//! ```text
//! plenodoc upload notes.md report.pdf
//! plenodoc status
//! plenodoc chat --provider groq
//! ```

pub mod cli;
pub mod commands;
pub mod repl;

pub use cli::{Cli, Commands};
pub use commands::execute;
