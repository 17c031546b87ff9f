//! Tickler Server Library
//!
//! This crate provides the task store, the reminder scheduler, delivery
//! fan-out and the HTTP API for Tickler.

pub mod config;
pub mod delivery;
pub mod http;
pub mod metrics;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod store;

pub use config::{Config, ProviderConfig};
pub use delivery::{DeliveryFanout, SubscriptionRegistry};
pub use scheduler::{ReminderScheduler, ScheduleOutcome, SchedulerConfig};
pub use service::{ServiceError, TaskService};
pub use state::AppState;
pub use store::{InMemoryTaskStore, JsonFileTaskStore, StoreError, TaskStore, TaskUpdate};
