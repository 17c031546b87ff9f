//! Tickler Server
//!
//! Serves the task API, restores pending reminders on startup and flushes the
//! task store on shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tickler_extract::{AnthropicConfig, HeuristicDefaults, OpenAiConfig};
use tickler_server::delivery::SmtpSettings;
use tickler_server::scheduler::{SchedulerConfig, SystemClock};
use tickler_server::{http, AppState, Config, InMemoryTaskStore, JsonFileTaskStore, ProviderConfig, TaskStore};

/// Tickler to-do server with due-date extraction and reminders.
#[derive(Parser, Debug)]
#[command(name = "tickler-server", about = "Tickler to-do server with reminders")]
struct Args {
    /// HTTP server address
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind_addr: String,

    /// JSON file to persist tasks in (in-memory when omitted)
    #[arg(long)]
    store: Option<PathBuf>,

    /// IANA time zone for reading dates and rendering reminders
    #[arg(long, default_value = "UTC")]
    timezone: String,

    /// Remote extraction providers in priority order (openai, anthropic)
    #[arg(long, value_delimiter = ',')]
    providers: Vec<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// OpenAI model
    #[arg(long, default_value = "gpt-4o-mini")]
    openai_model: String,

    /// OpenAI-compatible base URL
    #[arg(long, default_value = "https://api.openai.com")]
    openai_base_url: String,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,

    /// Anthropic model
    #[arg(long, default_value = "claude-3-5-haiku-latest")]
    anthropic_model: String,

    /// Anthropic base URL
    #[arg(long, default_value = "https://api.anthropic.com")]
    anthropic_base_url: String,

    /// Per-provider extraction timeout in seconds
    #[arg(long, default_value = "8")]
    extraction_timeout_secs: u64,

    /// Minutes before the due instant that a reminder fires
    #[arg(long, default_value = "60")]
    lead_time_mins: u64,

    /// Seconds to wait when a task is due within the lead time
    #[arg(long, default_value = "5")]
    near_delay_secs: u64,

    /// Longest single timer sleep in milliseconds; longer waits are chained
    #[arg(long, default_value = "2147483647")]
    delay_ceiling_ms: u64,

    /// Time of day for a bare "tomorrow" (HH:MM)
    #[arg(long, default_value = "09:00")]
    tomorrow_time: String,

    /// Time of day for a bare "today" (HH:MM)
    #[arg(long, default_value = "17:00")]
    today_time: String,

    /// Time of day for "next week" (HH:MM)
    #[arg(long, default_value = "09:00")]
    next_week_time: String,

    /// Email address for tasks without a notify target
    #[arg(long)]
    default_notify_target: Option<String>,

    /// SMTP relay host (email channel disabled when omitted)
    #[arg(long)]
    smtp_host: Option<String>,

    /// SMTP port
    #[arg(long, default_value = "587")]
    smtp_port: u16,

    /// SMTP username
    #[arg(long)]
    smtp_username: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,

    /// Sender address for reminder emails
    #[arg(long, default_value = "tickler@localhost")]
    smtp_from: String,
}

impl Args {
    fn into_config(self) -> Result<Config, Box<dyn std::error::Error>> {
        let display_zone: Tz = self
            .timezone
            .parse()
            .map_err(|e| format!("Invalid time zone '{}': {}", self.timezone, e))?;

        if self.delay_ceiling_ms == 0 {
            return Err("--delay-ceiling-ms must be greater than zero".into());
        }

        let mut providers = Vec::new();
        for name in &self.providers {
            match name.trim() {
                "openai" => {
                    let key = self
                        .openai_api_key
                        .clone()
                        .ok_or("openai provider requires OPENAI_API_KEY")?;
                    providers.push(ProviderConfig::OpenAi(
                        OpenAiConfig::new(key, &self.openai_model).with_base_url(&self.openai_base_url),
                    ));
                }
                "anthropic" => {
                    let key = self
                        .anthropic_api_key
                        .clone()
                        .ok_or("anthropic provider requires ANTHROPIC_API_KEY")?;
                    providers.push(ProviderConfig::Anthropic(
                        AnthropicConfig::new(key, &self.anthropic_model)
                            .with_base_url(&self.anthropic_base_url),
                    ));
                }
                other => return Err(format!("Unknown extraction provider '{other}'").into()),
            }
        }

        let smtp = self.smtp_host.map(|host| {
            let settings = SmtpSettings::new(host, self.smtp_from).with_port(self.smtp_port);
            match (self.smtp_username, self.smtp_password) {
                (Some(user), Some(pass)) => settings.with_credentials(user, pass),
                _ => settings,
            }
        });

        let defaults = Config::default();
        Ok(Config {
            bind_addr: self.bind_addr,
            store_path: self.store,
            display_zone,
            default_notify_target: self.default_notify_target,
            heuristics: HeuristicDefaults {
                tomorrow: parse_time(&self.tomorrow_time)?,
                today: parse_time(&self.today_time)?,
                next_week: parse_time(&self.next_week_time)?,
            },
            scheduler: SchedulerConfig {
                lead_time: Duration::from_secs(self.lead_time_mins * 60),
                near_delay: Duration::from_secs(self.near_delay_secs),
                delay_ceiling: Duration::from_millis(self.delay_ceiling_ms),
            },
            extraction_timeout: Duration::from_secs(self.extraction_timeout_secs),
            providers,
            smtp,
            ..defaults
        })
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| format!("Invalid time '{value}': {e}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tickler=info")),
        )
        .with_target(true)
        .init();

    let config = args.into_config()?;
    let addr: SocketAddr = config.bind_addr.parse()?;

    // Open task store
    let store: Arc<dyn TaskStore> = match &config.store_path {
        Some(path) => Arc::new(JsonFileTaskStore::open(path).await?),
        None => {
            info!("No store path given, tasks are kept in memory");
            Arc::new(InMemoryTaskStore::new())
        }
    };

    let state = AppState::from_config(&config, store.clone(), Arc::new(SystemClock))?;

    let restored = state.scheduler().restore().await?;
    info!(
        addr = %addr,
        zone = %config.display_zone,
        restored,
        "Starting Tickler server"
    );

    let scheduler = state.scheduler().clone();
    let router = http::create_router(state);
    let listener = TcpListener::bind(addr).await?;

    info!("HTTP server listening on {}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server error");
    }

    // Stop timers and drain deliveries before the final store write.
    scheduler.shutdown().await;
    if let Err(e) = store.flush().await {
        error!(error = %e, "Failed to flush task store");
    }

    info!("Tickler server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Result<Config, Box<dyn std::error::Error>> {
        let argv = std::iter::once("tickler-server").chain(args.iter().copied());
        Args::try_parse_from(argv)?.into_config()
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let config = config(&[]).unwrap();
        let defaults = Config::default();
        assert_eq!(config.scheduler, defaults.scheduler);
        assert_eq!(config.heuristics, defaults.heuristics);
        assert_eq!(config.extraction_timeout, defaults.extraction_timeout);
    }

    #[test]
    fn test_timing_flags() {
        let config = config(&[
            "--delay-ceiling-ms",
            "60000",
            "--next-week-time",
            "08:30",
            "--lead-time-mins",
            "15",
        ])
        .unwrap();

        assert_eq!(config.scheduler.delay_ceiling, Duration::from_secs(60));
        assert_eq!(config.scheduler.lead_time, Duration::from_secs(15 * 60));
        assert_eq!(
            config.heuristics.next_week,
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config(&["--delay-ceiling-ms", "0"]).is_err());
        assert!(config(&["--next-week-time", "9am"]).is_err());
        assert!(config(&["--timezone", "Mars/Olympus"]).is_err());
        assert!(config(&["--providers", "carrier-pigeon"]).is_err());
    }
}
