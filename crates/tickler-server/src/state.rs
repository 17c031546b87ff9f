//! Shared application state.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::delivery::{DeliveryError, DeliveryFanout, HttpPushTransport, SmtpMailer, SubscriptionRegistry};
use crate::scheduler::{Clock, ReminderScheduler};
use crate::service::TaskService;
use crate::store::TaskStore;

/// Shared application state handed to every HTTP handler.
pub struct AppState {
    /// Task operations.
    pub tasks: TaskService,

    /// Push subscriptions reminders are broadcast to.
    pub subscriptions: Arc<SubscriptionRegistry>,

    /// Authoritative task storage.
    pub store: Arc<dyn TaskStore>,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(
        tasks: TaskService,
        subscriptions: Arc<SubscriptionRegistry>,
        store: Arc<dyn TaskStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tasks,
            subscriptions,
            store,
        })
    }

    /// Wire up extraction, delivery and scheduling from `config`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>, DeliveryError> {
        let subscriptions = Arc::new(SubscriptionRegistry::new());

        let mut fanout = DeliveryFanout::new(subscriptions.clone(), config.display_zone)
            .with_push(Arc::new(HttpPushTransport::new(config.push_timeout)?));
        if let Some(smtp) = &config.smtp {
            fanout = fanout.with_mailer(Arc::new(SmtpMailer::new(smtp)?));
            info!(host = %smtp.host, port = smtp.port, "Email channel enabled");
        }
        if let Some(target) = &config.default_notify_target {
            fanout = fanout.with_default_target(target.clone());
        }

        let scheduler = ReminderScheduler::with_clock(
            config.scheduler,
            store.clone(),
            Arc::new(fanout),
            clock.clone(),
        );

        let cascade = config.build_cascade();
        info!(providers = ?cascade.provider_names(), "Extraction cascade ready");

        let tasks = TaskService::new(store.clone(), scheduler, Arc::new(cascade), config.display_zone)
            .with_clock(clock);

        Ok(Self::new(tasks, subscriptions, store))
    }

    /// The reminder scheduler behind the task service.
    pub fn scheduler(&self) -> &ReminderScheduler {
        self.tasks.scheduler()
    }
}
