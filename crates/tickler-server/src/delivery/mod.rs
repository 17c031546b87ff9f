//! Reminder delivery fan-out.
//!
//! A fired reminder is offered to every configured channel independently.
//! Email is directed at the task's notify target; push is broadcast to every
//! registered subscription. Channel failures are logged and never surface to
//! the scheduler. A push subscription whose send fails is dropped from the
//! registry for good.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use tickler_core::{Task, TaskId};

use crate::scheduler::ReminderSink;

pub mod email;
pub mod push;
pub mod registry;

pub use email::{MailTransport, SmtpMailer, SmtpSettings};
pub use push::{HttpPushTransport, PushTransport};
pub use registry::SubscriptionRegistry;

/// Format used for due instants in reminder text.
pub const DUE_FORMAT: &str = "%a %b %-d, %-I:%M %p %Z";

/// Errors a single channel send can report.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Endpoint rejected delivery with status {status}")]
    Rejected { status: u16 },

    #[error("Invalid address '{address}': {reason}")]
    Address { address: String, reason: String },
}

/// Content of a reminder, shared by every channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderMessage {
    pub task_id: TaskId,
    pub title: String,
    pub subject: String,
    pub body: String,
    pub due_instant: DateTime<Utc>,
}

impl ReminderMessage {
    /// Build the message for `task`, rendering the due instant in `zone`.
    pub fn compose(task: &Task, due_instant: DateTime<Utc>, zone: Tz) -> Self {
        let due_text = format_due(due_instant, zone);
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            subject: format!("Reminder: {}", task.title),
            body: format!("\"{}\" is due {}.", task.title, due_text),
            due_instant,
        }
    }
}

/// Render an instant for humans in the display zone.
pub fn format_due(instant: DateTime<Utc>, zone: Tz) -> String {
    instant.with_timezone(&zone).format(DUE_FORMAT).to_string()
}

/// What happened during one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub email_sent: bool,
    pub push_sent: usize,
    pub push_pruned: usize,
}

/// Delivers a fired reminder across every configured channel.
pub struct DeliveryFanout {
    registry: Arc<SubscriptionRegistry>,
    display_zone: Tz,
    mailer: Option<Arc<dyn MailTransport>>,
    default_target: Option<String>,
    push: Option<Arc<dyn PushTransport>>,
}

impl DeliveryFanout {
    /// Create a fan-out with no channels configured.
    pub fn new(registry: Arc<SubscriptionRegistry>, display_zone: Tz) -> Self {
        Self {
            registry,
            display_zone,
            mailer: None,
            default_target: None,
            push: None,
        }
    }

    /// Enable the email channel.
    pub fn with_mailer(mut self, mailer: Arc<dyn MailTransport>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Address used when a task has no notify target of its own.
    pub fn with_default_target(mut self, target: impl Into<String>) -> Self {
        self.default_target = Some(target.into());
        self
    }

    /// Enable the push channel.
    pub fn with_push(mut self, push: Arc<dyn PushTransport>) -> Self {
        self.push = Some(push);
        self
    }

    /// Attempt every channel. Never fails.
    pub async fn deliver(&self, task: &Task, due_instant: DateTime<Utc>) -> DeliveryReport {
        let message = ReminderMessage::compose(task, due_instant, self.display_zone);
        let mut report = DeliveryReport::default();

        report.email_sent = self.deliver_email(task, &message).await;
        let (sent, pruned) = self.deliver_push(&message).await;
        report.push_sent = sent;
        report.push_pruned = pruned;

        info!(
            task_id = %task.id,
            email = report.email_sent,
            push_sent = report.push_sent,
            push_pruned = report.push_pruned,
            "Reminder delivered"
        );
        report
    }

    async fn deliver_email(&self, task: &Task, message: &ReminderMessage) -> bool {
        let Some(mailer) = &self.mailer else {
            return false;
        };
        let Some(target) = task
            .notify_target
            .as_deref()
            .or(self.default_target.as_deref())
        else {
            debug!(task_id = %task.id, "No email target, skipping email");
            return false;
        };

        match mailer.send(target, message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(task_id = %task.id, to = %target, error = %e, "Email delivery failed");
                false
            }
        }
    }

    async fn deliver_push(&self, message: &ReminderMessage) -> (usize, usize) {
        let Some(push) = &self.push else {
            return (0, 0);
        };

        let mut sent = 0;
        let mut pruned = 0;
        for subscription in self.registry.snapshot() {
            match push.send(&subscription, message).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(
                        endpoint = %subscription.endpoint,
                        error = %e,
                        "Push delivery failed, removing subscription"
                    );
                    if self.registry.remove(&subscription.endpoint) {
                        pruned += 1;
                    }
                }
            }
        }
        (sent, pruned)
    }
}

#[async_trait]
impl ReminderSink for DeliveryFanout {
    async fn deliver(&self, task: &Task, due_instant: DateTime<Utc>) {
        DeliveryFanout::deliver(self, task, due_instant).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Mutex;
    use tickler_core::Subscription;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, ReminderMessage)>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingMailer {
        async fn send(&self, to: &str, message: &ReminderMessage) -> Result<(), DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Transport("smtp down".into()));
            }
            self.sent.lock().unwrap().push((to.to_string(), message.clone()));
            Ok(())
        }
    }

    /// Fails for any endpoint containing "dead".
    #[derive(Default)]
    struct SelectivePush {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushTransport for SelectivePush {
        async fn send(&self, subscription: &Subscription, _message: &ReminderMessage) -> Result<(), DeliveryError> {
            if subscription.endpoint.contains("dead") {
                return Err(DeliveryError::Rejected { status: 410 });
            }
            self.sent.lock().unwrap().push(subscription.endpoint.clone());
            Ok(())
        }
    }

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn registry_with(endpoints: &[&str]) -> Arc<SubscriptionRegistry> {
        let registry = Arc::new(SubscriptionRegistry::new());
        for endpoint in endpoints {
            registry.register(&json!({ "endpoint": endpoint })).unwrap();
        }
        registry
    }

    #[test]
    fn test_format_due_in_display_zone() {
        assert_eq!(
            format_due(due(), chrono_tz::America::New_York),
            "Mon Jan 15, 9:00 AM EST"
        );
        assert_eq!(format_due(due(), chrono_tz::UTC), "Mon Jan 15, 2:00 PM UTC");
    }

    #[test]
    fn test_compose_message() {
        let task = Task::new("Call mom", Some(due()));
        let message = ReminderMessage::compose(&task, due(), chrono_tz::UTC);
        assert_eq!(message.subject, "Reminder: Call mom");
        assert_eq!(message.body, "\"Call mom\" is due Mon Jan 15, 2:00 PM UTC.");
    }

    #[tokio::test]
    async fn test_failing_subscription_is_pruned_and_others_delivered() {
        let registry = registry_with(&[
            "https://push.example/a",
            "https://push.example/dead",
            "https://push.example/z",
        ]);
        let push = Arc::new(SelectivePush::default());
        let fanout = DeliveryFanout::new(registry.clone(), chrono_tz::UTC).with_push(push.clone());

        let report = fanout.deliver(&Task::new("x", Some(due())), due()).await;

        assert_eq!(report.push_sent, 2);
        assert_eq!(report.push_pruned, 1);
        assert_eq!(
            *push.sent.lock().unwrap(),
            vec!["https://push.example/a", "https://push.example/z"]
        );
        let remaining: Vec<String> = registry.snapshot().into_iter().map(|s| s.endpoint).collect();
        assert_eq!(remaining, vec!["https://push.example/a", "https://push.example/z"]);
    }

    #[tokio::test]
    async fn test_email_uses_task_target_then_default() {
        let mailer = Arc::new(RecordingMailer::default());
        let fanout = DeliveryFanout::new(registry_with(&[]), chrono_tz::UTC)
            .with_mailer(mailer.clone())
            .with_default_target("default@example.com");

        let own = Task::new("a", Some(due())).with_notify_target("me@example.com");
        let other = Task::new("b", Some(due()));
        assert!(fanout.deliver(&own, due()).await.email_sent);
        assert!(fanout.deliver(&other, due()).await.email_sent);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent[0].0, "me@example.com");
        assert_eq!(sent[1].0, "default@example.com");
    }

    #[tokio::test]
    async fn test_email_skipped_without_target() {
        let mailer = Arc::new(RecordingMailer::default());
        let fanout = DeliveryFanout::new(registry_with(&[]), chrono_tz::UTC).with_mailer(mailer.clone());

        let report = fanout.deliver(&Task::new("a", Some(due())), due()).await;
        assert!(!report.email_sent);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_email_failure_does_not_block_push() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let push = Arc::new(SelectivePush::default());
        let fanout = DeliveryFanout::new(registry_with(&["https://push.example/a"]), chrono_tz::UTC)
            .with_mailer(mailer)
            .with_default_target("me@example.com")
            .with_push(push.clone());

        let report = fanout.deliver(&Task::new("a", Some(due())), due()).await;
        assert!(!report.email_sent);
        assert_eq!(report.push_sent, 1);
    }
}
