//! Result of turning free text into a title and a due instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized output of the extraction cascade.
///
/// Produced fresh for every extraction call and written into the task store
/// by the caller; never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    /// Task title with any temporal phrase removed.
    pub title: String,

    /// Absolute due instant, if one could be determined.
    pub due_instant: Option<DateTime<Utc>>,
}

impl ParseResult {
    /// Create a result with a due instant.
    pub fn new(title: impl Into<String>, due_instant: Option<DateTime<Utc>>) -> Self {
        Self {
            title: title.into(),
            due_instant,
        }
    }

    /// Create a result with no due instant, keeping the trimmed input as title.
    pub fn undated(raw_input: &str) -> Self {
        Self {
            title: raw_input.trim().to_string(),
            due_instant: None,
        }
    }

    /// Returns true if a due instant was extracted.
    pub fn has_due(&self) -> bool {
        self.due_instant.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undated_trims_input() {
        let result = ParseResult::undated("  buy milk \n");
        assert_eq!(result.title, "buy milk");
        assert!(!result.has_due());
    }
}
