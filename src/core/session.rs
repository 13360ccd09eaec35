//! Session data model: turns, cumulative totals, and the provider-facing
//! view of conversation history.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::api::{ChatMessage, ROLE_ASSISTANT, ROLE_SYSTEM, ROLE_USER};

/// One completed exchange: a user message and the assistant response,
/// with the request's measured tokens and cost.
///
/// `cost_picousd` is `None` when the model had no price table entry
/// ("cost unknown"). `interrupted` marks turns whose response was cut
/// short by a provider failure or a user interrupt; their token counts
/// are zero because the terminal usage record never arrived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub timestamp: DateTime<Local>,
    pub user: String,
    pub assistant: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_picousd: Option<u64>,
    #[serde(default)]
    pub interrupted: bool,
}

/// Running totals for a session. Costs are integer picodollars so the
/// sum over turns is exact at any observation point.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionTotals {
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_cost_picousd: u64,
    pub request_count: u32,
    #[serde(default)]
    pub unknown_cost_requests: u32,
}

impl SessionTotals {
    pub fn total_tokens(&self) -> u64 {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}

/// The persisted shape of one session: metadata, ordered turns, and
/// final totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub model: String,
    pub turns: Vec<Turn>,
    pub totals: SessionTotals,
}

impl SessionRecord {
    pub fn new(started_at: DateTime<Local>, model: impl Into<String>) -> Self {
        Self {
            started_at,
            ended_at: None,
            model: model.into(),
            turns: Vec::new(),
            totals: SessionTotals::default(),
        }
    }
}

/// Build the provider-formatted message list for the next request: the
/// system prompt, every prior turn in order, then the new user message.
///
/// Interrupted turns contribute whatever partial assistant text they
/// captured; a turn with no assistant text at all contributes only its
/// user message, since providers reject empty assistant messages.
pub fn api_messages(system_prompt: &str, turns: &[Turn], user_message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns.len() * 2 + 2);
    if !system_prompt.is_empty() {
        messages.push(ChatMessage::new(ROLE_SYSTEM, system_prompt));
    }
    for turn in turns {
        messages.push(ChatMessage::new(ROLE_USER, &turn.user));
        if !turn.assistant.is_empty() {
            messages.push(ChatMessage::new(ROLE_ASSISTANT, &turn.assistant));
        }
    }
    messages.push(ChatMessage::new(ROLE_USER, user_message));
    messages
}
