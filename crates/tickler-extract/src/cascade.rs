//! Ordered provider chain that always ends at the local extractor.
//!
//! Remote providers are tried strictly in the order they were added. The
//! first one that returns a well-formed result wins; errors and timeouts are
//! logged and the next tier is tried. When every remote tier has failed (or
//! none is configured) the [`LocalExtractor`] answers, so extraction as a
//! whole never fails.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use tickler_core::ParseResult;

use crate::error::ExtractError;
use crate::heuristic::LocalExtractor;
use crate::provider::{DueDateProvider, ExtractionRequest};

/// Default per-provider time budget.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(8);

/// The extraction cascade.
pub struct ExtractionCascade {
    providers: Vec<Box<dyn DueDateProvider>>,
    local: LocalExtractor,
    provider_timeout: Duration,
}

impl ExtractionCascade {
    /// Create a cascade with no remote providers.
    pub fn new(local: LocalExtractor) -> Self {
        Self {
            providers: Vec::new(),
            local,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Append a remote provider at the lowest priority so far.
    pub fn with_provider<P: DueDateProvider + 'static>(self, provider: P) -> Self {
        self.with_boxed_provider(Box::new(provider))
    }

    /// Append an already boxed provider.
    pub fn with_boxed_provider(mut self, provider: Box<dyn DueDateProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Set the time budget for each remote provider call.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Names of the remote providers in priority order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Extract a title and due instant from free text.
    pub async fn extract(&self, raw_input: &str, reference: DateTime<Utc>, zone: Tz) -> ParseResult {
        let request = ExtractionRequest {
            raw_input,
            reference,
            zone,
        };

        // Nothing for a remote service to read.
        if !raw_input.trim().is_empty() {
            for provider in &self.providers {
                match self.try_provider(provider.as_ref(), &request).await {
                    Ok(result) => {
                        info!(
                            provider = provider.name(),
                            has_due = result.has_due(),
                            "extraction succeeded"
                        );
                        return normalize(result, raw_input);
                    }
                    Err(e) => {
                        warn!(
                            provider = provider.name(),
                            error = %e,
                            "extraction provider failed, trying next"
                        );
                    }
                }
            }
        }

        debug!("using local extractor");
        normalize(self.local.extract(raw_input, reference, zone), raw_input)
    }

    async fn try_provider(
        &self,
        provider: &dyn DueDateProvider,
        request: &ExtractionRequest<'_>,
    ) -> Result<ParseResult, ExtractError> {
        tokio::time::timeout(self.provider_timeout, provider.extract(request))
            .await
            .map_err(|_| ExtractError::Timeout(self.provider_timeout))?
    }
}

fn normalize(mut result: ParseResult, raw_input: &str) -> ParseResult {
    if result.title.trim().is_empty() {
        result.title = raw_input.trim().to_string();
    }
    result
}
