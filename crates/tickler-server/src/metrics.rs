//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use tracing::warn;

use crate::state::AppState;

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_task_metrics(state, &mut output).await;
    collect_reminder_metrics(state, &mut output);

    output
}

/// Collect task counts by completion state.
async fn collect_task_metrics(state: &Arc<AppState>, output: &mut String) {
    let tasks = match state.store.list().await {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(error = %e, "Failed to list tasks for metrics");
            Vec::new()
        }
    };

    let completed = tasks.iter().filter(|t| t.completed).count();
    let open = tasks.len() - completed;
    let dated = tasks.iter().filter(|t| t.due_instant.is_some()).count();

    writeln!(output, "# HELP tickler_tasks_total Number of tasks by status").ok();
    writeln!(output, "# TYPE tickler_tasks_total gauge").ok();
    writeln!(output, "tickler_tasks_total{{status=\"open\"}} {open}").ok();
    writeln!(output, "tickler_tasks_total{{status=\"completed\"}} {completed}").ok();

    writeln!(output).ok();
    writeln!(output, "# HELP tickler_tasks_with_due Number of tasks that have a due instant").ok();
    writeln!(output, "# TYPE tickler_tasks_with_due gauge").ok();
    writeln!(output, "tickler_tasks_with_due {dated}").ok();
}

/// Collect pending reminder and subscription counts.
fn collect_reminder_metrics(state: &Arc<AppState>, output: &mut String) {
    let pending = state.scheduler().pending_count();
    let subscriptions = state.subscriptions.len();

    writeln!(output).ok();
    writeln!(output, "# HELP tickler_reminders_pending Number of armed reminder timers").ok();
    writeln!(output, "# TYPE tickler_reminders_pending gauge").ok();
    writeln!(output, "tickler_reminders_pending {pending}").ok();

    writeln!(output).ok();
    writeln!(output, "# HELP tickler_push_subscriptions Number of registered push subscriptions").ok();
    writeln!(output, "# TYPE tickler_push_subscriptions gauge").ok();
    writeln!(output, "tickler_push_subscriptions {subscriptions}").ok();
}
