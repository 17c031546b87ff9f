//! HTTP request handlers.

mod health;
mod subscriptions;
mod tasks;

pub use health::{health_check, metrics_handler};
pub use subscriptions::register_subscription;
pub use tasks::{create_task, delete_task, get_task, list_tasks, toggle_task, update_task};
