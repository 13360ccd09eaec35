//! Interactive chat session loop
//!
//! A plain read-eval-print loop: read one line of user text, stream the
//! assistant response to stdout, account the request's cost, append the
//! turn to the session transcript, repeat. One request in flight at a
//! time; a failed or interrupted request records a partial turn and the
//! loop keeps going.

use std::error::Error;
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::api::TokenUsage;
use crate::cli::Args;
use crate::core::chat_stream::{ChatStream, ProviderError, StreamEvent};
use crate::core::config::Config;
use crate::core::context::build_system_prompt;
use crate::core::pricing::{format_usd, CostDelta, CostTracker, PricingTable};
use crate::core::session::{api_messages, SessionRecord, SessionTotals, Turn};
use crate::core::transcript::TranscriptStore;

const EXIT_COMMANDS: [&str; 2] = ["quit", "exit"];

/// How a single streamed request ended.
enum StreamOutcome {
    /// The full response arrived, with its usage record.
    Completed { text: String, usage: TokenUsage },
    /// The stream died (provider failure) or the user interrupted it;
    /// `error` is `None` for a user interrupt.
    Interrupted {
        text: String,
        error: Option<ProviderError>,
    },
}

pub async fn run_chat(args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let api_key = config.resolve_api_key()?;
    let model = args.model.unwrap_or_else(|| config.model().to_string());
    let base_url = config.base_url().to_string();

    let system_prompt = build_system_prompt(&config.context_dir(), config.system_prompt());
    let started_at = Local::now();
    let mut transcript = TranscriptStore::create(
        &config.transcripts_dir(),
        SessionRecord::new(started_at, model.clone()),
    )?;
    let mut tracker = CostTracker::new(PricingTable::from_config(&config.pricing));
    let client = reqwest::Client::new();

    println!("Personal assistant");
    println!("Model: {model}");
    println!("Type 'quit' or 'exit' to end. Ctrl+C also works.");
    println!();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut turns: Vec<Turn> = Vec::new();

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = stdin.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            // End of input (Ctrl+D or a closed pipe)
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_command(input) {
            break;
        }

        let messages = api_messages(&system_prompt, &turns, input);

        print!("\nAssistant: ");
        io::stdout().flush()?;
        let outcome = stream_response(&client, &base_url, &api_key, &model, messages).await;
        println!("\n");

        let turn = match outcome {
            StreamOutcome::Completed { text, usage } => {
                let delta = tracker.record(&model, usage.prompt_tokens, usage.completion_tokens);
                if delta.cost.is_none() {
                    warn!(model = %model, "no pricing entry for model; cost recorded as unknown");
                }
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "request complete"
                );
                completed_turn(input, text, delta)
            }
            StreamOutcome::Interrupted { text, error } => {
                match &error {
                    Some(error) => eprintln!("❌ Request failed: {error}"),
                    None => println!("[interrupted]"),
                }
                // Best available estimate: the usage record never arrived
                let delta = tracker.record(&model, 0, 0);
                interrupted_turn(input, text, delta)
            }
        };

        if let Err(e) = transcript.append_turn(turn.clone(), *tracker.totals()) {
            warn!("transcript write failed, will retry on the next turn: {e}");
            eprintln!("⚠️  Could not save transcript: {e}");
        }
        turns.push(turn);
    }

    if let Err(e) = transcript.close(*tracker.totals()) {
        eprintln!("⚠️  Could not finalize transcript: {e}");
    }
    print_session_summary(tracker.totals(), transcript.path());
    Ok(())
}

/// Consume one streamed request, rendering fragments as they arrive.
/// Ctrl+C abandons the stream, which closes the connection.
async fn stream_response(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    messages: Vec<crate::api::ChatMessage>,
) -> StreamOutcome {
    let mut stream = match ChatStream::open(client, base_url, api_key, model, messages).await {
        Ok(stream) => stream,
        Err(error) => {
            return StreamOutcome::Interrupted {
                text: String::new(),
                error: Some(error),
            }
        }
    };

    let mut text = String::new();
    loop {
        let event = tokio::select! {
            event = stream.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                return StreamOutcome::Interrupted { text, error: None };
            }
        };

        match event {
            Ok(Some(StreamEvent::Delta(content))) => {
                print!("{content}");
                let _ = io::stdout().flush();
                text.push_str(&content);
            }
            Ok(Some(StreamEvent::Completed(usage))) => {
                return StreamOutcome::Completed { text, usage };
            }
            Ok(None) => {
                // Clean end without a usage record is caught by the stream
                // itself; getting here means the sequence was exhausted
                return StreamOutcome::Interrupted {
                    text,
                    error: Some(ProviderError::MissingUsage),
                };
            }
            Err(error) => {
                return StreamOutcome::Interrupted {
                    text,
                    error: Some(error),
                };
            }
        }
    }
}

fn is_exit_command(input: &str) -> bool {
    EXIT_COMMANDS.iter().any(|cmd| input.eq_ignore_ascii_case(cmd))
}

fn completed_turn(user: &str, assistant: String, delta: CostDelta) -> Turn {
    Turn {
        timestamp: Local::now(),
        user: user.to_string(),
        assistant,
        prompt_tokens: delta.prompt_tokens,
        completion_tokens: delta.completion_tokens,
        cost_picousd: delta.cost,
        interrupted: false,
    }
}

fn interrupted_turn(user: &str, partial: String, delta: CostDelta) -> Turn {
    Turn {
        timestamp: Local::now(),
        user: user.to_string(),
        assistant: partial,
        prompt_tokens: 0,
        completion_tokens: 0,
        cost_picousd: delta.cost,
        interrupted: true,
    }
}

fn print_session_summary(totals: &SessionTotals, path: &Path) {
    println!("Conversation saved to {}", path.display());
    if totals.request_count > 0 {
        let cost = if totals.unknown_cost_requests > 0 {
            format!(
                "{} (+{} request(s) with unknown cost)",
                format_usd(totals.total_cost_picousd),
                totals.unknown_cost_requests
            )
        } else {
            format_usd(totals.total_cost_picousd)
        };
        println!(
            "Session: {} tokens ({} prompt + {} completion) | Cost: {} | {} request(s)",
            totals.total_tokens(),
            totals.total_prompt_tokens,
            totals.total_completion_tokens,
            cost,
            totals.request_count
        );
    }
    println!("Goodbye!");
}
