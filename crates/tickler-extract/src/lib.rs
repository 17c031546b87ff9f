//! Due-date extraction for Tickler
//!
//! This crate turns free-text task descriptions into a title and an absolute
//! due instant. Remote completion services are tried in priority order and
//! the in-process [`LocalExtractor`] answers when they all fail, so
//! extraction itself never fails.
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use tickler_extract::{ExtractionCascade, LocalExtractor, OpenAiConfig, OpenAiProvider};
//!
//! async fn extract() {
//!     let cascade = ExtractionCascade::new(LocalExtractor::default())
//!         .with_provider(OpenAiProvider::new(OpenAiConfig::new("sk-...", "gpt-4o-mini")));
//!
//!     let parsed = cascade
//!         .extract("Call mom in 2 hours", Utc::now(), chrono_tz::Europe::Berlin)
//!         .await;
//!
//!     println!("{} due {:?}", parsed.title, parsed.due_instant);
//! }
//! ```

mod anthropic;
mod cascade;
mod error;
mod grammar;
mod heuristic;
mod openai;
mod provider;
mod zone;

// Re-export main types
pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use cascade::{ExtractionCascade, DEFAULT_PROVIDER_TIMEOUT};
pub use error::ExtractError;
pub use heuristic::{HeuristicDefaults, LocalExtractor};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::{parse_structured_reply, DueDateProvider, ExtractionRequest, SYSTEM_PROMPT};
pub use zone::{local_to_utc, utc_to_local};
