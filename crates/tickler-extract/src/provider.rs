//! Provider trait and the structured-reply contract shared by remote providers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::warn;

use tickler_core::ParseResult;

use crate::error::ExtractError;

/// Input handed to every provider in the cascade.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// Free text as typed by the user.
    pub raw_input: &'a str,
    /// "Now" for the purpose of resolving relative phrases.
    pub reference: DateTime<Utc>,
    /// Zone the user's wall-clock phrases are expressed in.
    pub zone: Tz,
}

/// A single tier of the extraction cascade.
///
/// Implementations either return a well-formed result or an error; the
/// cascade treats any error as "try the next tier".
#[async_trait]
pub trait DueDateProvider: Send + Sync {
    /// Short provider name used in logs and configuration.
    fn name(&self) -> &str;

    /// Extract a title and due instant from the request.
    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<ParseResult, ExtractError>;
}

/// System instruction sent to remote completion services.
pub const SYSTEM_PROMPT: &str = "You extract to-do items from free text. \
Reply with a single JSON object and nothing else, shaped exactly as \
{\"title\": string, \"dueDate\": string | null}. \
\"title\" is the task with any date or time wording removed. \
\"dueDate\" is the absolute due date-time in ISO 8601 with a UTC offset \
(for example 2024-01-15T14:00:00Z), resolved against the current date-time and \
time zone given by the user; prefer the next future occurrence for ambiguous \
phrases. Use null when the text has no due date.";

/// Build the user message for a remote provider.
pub fn user_prompt(request: &ExtractionRequest<'_>) -> String {
    let local_now = request.reference.with_timezone(&request.zone);
    format!(
        "Current date-time: {} ({})\nTask: {}",
        local_now.to_rfc3339(),
        request.zone.name(),
        request.raw_input
    )
}

/// Validate a completion service's text reply into a [`ParseResult`].
///
/// The reply must be a JSON object (optionally wrapped in a Markdown code
/// fence). A missing or blank title falls back to the raw input; a due date
/// that is not a valid RFC 3339 instant is dropped rather than failing the
/// whole reply.
pub fn parse_structured_reply(reply: &str, raw_input: &str) -> Result<ParseResult, ExtractError> {
    let value: Value = serde_json::from_str(unfence(reply))?;
    let object = value
        .as_object()
        .ok_or_else(|| ExtractError::Malformed(format!("expected JSON object, got: {value}")))?;

    let title = object
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| raw_input.trim())
        .to_string();

    let due_field = ["dueDate", "due_date", "dueInstant"]
        .iter()
        .find_map(|key| object.get(*key));

    let due_instant = match due_field {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => parse_instant(s),
        Some(other) => {
            warn!(value = %other, "ignoring non-string due date in provider reply");
            None
        }
    };

    Ok(ParseResult::new(title, due_instant))
}

/// Parse an absolute instant. Returns `None` for anything without an offset.
pub fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(text.trim()) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!(value = %text, error = %e, "ignoring unparseable due date");
            None
        }
    }
}

fn unfence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
