//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use tickler_extract::{
    AnthropicConfig, AnthropicProvider, ExtractionCascade, HeuristicDefaults, LocalExtractor,
    OpenAiConfig, OpenAiProvider, DEFAULT_PROVIDER_TIMEOUT,
};

use crate::delivery::SmtpSettings;
use crate::scheduler::SchedulerConfig;

/// A remote extraction provider, in the order it should be tried.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiConfig),
    Anthropic(AnthropicConfig),
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub bind_addr: String,

    /// JSON file the task store lives in. `None` keeps tasks in memory.
    pub store_path: Option<PathBuf>,

    /// Zone that free-text dates are read in and reminders are rendered in.
    pub display_zone: Tz,

    /// Email address used when a task has no notify target.
    pub default_notify_target: Option<String>,

    /// Times of day for bare "tomorrow", "today" and "next week".
    pub heuristics: HeuristicDefaults,

    /// Lead time, near-immediate delay and delay ceiling.
    pub scheduler: SchedulerConfig,

    /// Per-provider extraction time budget.
    pub extraction_timeout: Duration,

    /// Remote providers in priority order.
    pub providers: Vec<ProviderConfig>,

    /// Email channel. Disabled when `None`.
    pub smtp: Option<SmtpSettings>,

    /// Push channel request timeout.
    pub push_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            store_path: None,
            display_zone: Tz::UTC,
            default_notify_target: None,
            heuristics: HeuristicDefaults::default(),
            scheduler: SchedulerConfig::default(),
            extraction_timeout: DEFAULT_PROVIDER_TIMEOUT,
            providers: Vec::new(),
            smtp: None,
            push_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Build the extraction cascade described by this config.
    pub fn build_cascade(&self) -> ExtractionCascade {
        self.providers.iter().fold(
            ExtractionCascade::new(LocalExtractor::new(self.heuristics))
                .with_provider_timeout(self.extraction_timeout),
            |cascade, provider| match provider {
                ProviderConfig::OpenAi(c) => cascade.with_provider(OpenAiProvider::new(c.clone())),
                ProviderConfig::Anthropic(c) => {
                    cascade.with_provider(AnthropicProvider::new(c.clone()))
                }
            },
        )
    }
}
