//! Tickler Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Storage
//! - Runtime specifics
//!
//! All types here represent the core business domain of Tickler: tasks with
//! optional due instants, the result of due-date extraction, and the push
//! subscriptions reminders are broadcast to.

pub mod error;
pub mod ids;
pub mod parse;
pub mod subscription;
pub mod task;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::TaskId;
pub use parse::ParseResult;
pub use subscription::Subscription;
pub use task::{FieldUpdate, Task, TaskPatch};
