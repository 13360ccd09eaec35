//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, initializes logging, and
//! hands control to the interactive chat loop.

pub mod chat;

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "valet")]
#[command(about = "A terminal personal assistant with local context and cost tracking")]
#[command(
    long_about = "Valet is a terminal personal assistant that connects to an OpenAI-compatible \
API for real-time conversations. Each session's system prompt is assembled from local \
context files, responses stream as they are generated, and the full exchange is saved \
as a JSON transcript with per-turn token counts and cost.\n\n\
Environment Variables:\n\
  VALET_API_KEY        Your provider API key (required)\n\
  OPENROUTER_API_KEY   Consulted when VALET_API_KEY is unset\n\
  RUST_LOG             Log filter for diagnostics on stderr (default: warn)\n\n\
Context files (under the configured context directory):\n\
  profile.md           Who the person is\n\
  preferences.md       How the assistant should behave\n\
  current_focus.md     What is relevant right now\n\n\
Controls:\n\
  Type                 Enter your message, Enter sends it\n\
  quit / exit          End the session\n\
  Ctrl+C               Interrupt a streaming response, or end the session"
)]
pub struct Args {
    /// Model to use for this session (overrides the configured default)
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Path to an alternate configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let args = Args::parse();
    tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(chat::run_chat(args))
}

/// Diagnostics go to stderr so they never interleave with streamed
/// responses on stdout. Quiet by default; RUST_LOG opens it up.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
