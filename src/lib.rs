//! Valet is a terminal-first personal assistant that wraps a remote LLM API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns configuration, context assembly, pricing and cost
//!   accounting, the streaming provider client, and transcript persistence.
//! - [`cli`] parses arguments and runs the interactive session loop.
//! - [`api`] defines the chat-completion wire payloads.
//! - [`utils`] holds small shared helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which initializes logging and dispatches
//! into [`cli::chat`] for interactive sessions.

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
