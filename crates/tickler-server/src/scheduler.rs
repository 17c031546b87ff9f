//! Reminder scheduler - one pending fire timer per task.
//!
//! Each armed reminder is a tokio task that sleeps until the reminder's fire
//! time and then hands the task to a [`ReminderSink`]. The map of pending
//! reminders is the single source of truth: a timer only delivers if, under
//! the map lock, its generation is still the current one for its task.
//! Timers carry the task id only and re-fetch the task from the store when
//! they fire. Every timer runs on a [`TaskTracker`] so shutdown can wait for
//! deliveries that are already under way.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use tickler_core::{Task, TaskId};

use crate::store::{StoreError, TaskStore};

/// How far ahead of the due instant a reminder fires.
pub const DEFAULT_LEAD_TIME: Duration = Duration::from_secs(60 * 60);

/// Delay used when the due instant is close enough that the lead time has
/// already passed.
pub const DEFAULT_NEAR_DELAY: Duration = Duration::from_secs(5);

/// Longest single sleep. Longer delays are split into a chain of sleeps.
pub const DEFAULT_DELAY_CEILING: Duration = Duration::from_millis(2_147_483_647);

/// Source of "now" for computing fire times.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receives tasks whose reminder has fired.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    async fn deliver(&self, task: &Task, due_instant: DateTime<Utc>);
}

/// Scheduler timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub lead_time: Duration,
    pub near_delay: Duration,
    pub delay_ceiling: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lead_time: DEFAULT_LEAD_TIME,
            near_delay: DEFAULT_NEAR_DELAY,
            delay_ceiling: DEFAULT_DELAY_CEILING,
        }
    }
}

/// A reminder that is armed and waiting to fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReminder {
    pub task_id: TaskId,
    pub fire_at: DateTime<Utc>,
    pub generation: u64,
}

/// Why a task was not scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoDueInstant,
    Completed,
    Overdue,
    ShuttingDown,
}

/// Result of a schedule request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Armed {
        /// Total time until the reminder fires.
        delay: Duration,
        /// Length of the first sleep, capped at the delay ceiling.
        first_segment: Duration,
        fire_at: DateTime<Utc>,
        generation: u64,
    },
    Skipped(SkipReason),
}

impl ScheduleOutcome {
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed { .. })
    }

    /// Total delay, if armed.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Self::Armed { delay, .. } => Some(*delay),
            Self::Skipped(_) => None,
        }
    }
}

struct ArmedTimer {
    reminder: PendingReminder,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
    pending: HashMap<TaskId, ArmedTimer>,
    next_generation: u64,
    shut_down: bool,
}

struct Inner {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn TaskStore>,
    sink: Arc<dyn ReminderSink>,
    state: Mutex<SchedulerState>,
    timers: TaskTracker,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, task_id: &TaskId, generation: u64) -> bool {
        self.lock()
            .pending
            .get(task_id)
            .is_some_and(|armed| armed.reminder.generation == generation)
    }

    async fn fire(&self, task_id: TaskId, generation: u64) {
        {
            let mut state = self.lock();
            match state.pending.get(&task_id) {
                Some(armed) if armed.reminder.generation == generation => {
                    state.pending.remove(&task_id);
                }
                _ => {
                    debug!(task_id = %task_id, generation, "Stale reminder timer, ignoring");
                    return;
                }
            }
        }

        let task = match self.store.get(&task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                info!(task_id = %task_id, "Reminder fired for deleted task, skipping");
                return;
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Failed to load task for reminder");
                return;
            }
        };

        let due = match task.due_instant {
            Some(due) if !task.completed => due,
            _ => {
                info!(task_id = %task_id, "Task no longer needs a reminder, skipping");
                return;
            }
        };

        info!(task_id = %task_id, due = %due, generation, "Reminder fired");
        self.sink.deliver(&task, due).await;
    }
}

/// Owns every pending reminder.
///
/// Cheap to clone; clones share the same pending map.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<Inner>,
}

impl ReminderScheduler {
    /// Create a scheduler on the wall clock.
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn TaskStore>,
        sink: Arc<dyn ReminderSink>,
    ) -> Self {
        Self::with_clock(config, store, sink, Arc::new(SystemClock))
    }

    /// Create a scheduler with a custom clock.
    pub fn with_clock(
        config: SchedulerConfig,
        store: Arc<dyn TaskStore>,
        sink: Arc<dyn ReminderSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                store,
                sink,
                state: Mutex::new(SchedulerState::default()),
                timers: TaskTracker::new(),
            }),
        }
    }

    /// Arm a reminder for `task`, replacing any reminder already pending for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, task: &Task) -> ScheduleOutcome {
        let now = self.inner.clock.now();
        let config = self.inner.config;

        let due = match task.due_instant {
            None => return self.skip(task, SkipReason::NoDueInstant),
            Some(_) if task.completed => return self.skip(task, SkipReason::Completed),
            Some(due) => due,
        };

        let lead = chrono::Duration::from_std(config.lead_time).unwrap_or(chrono::Duration::zero());
        let fire_at = due - lead;

        let (fire_at, delay) = if fire_at > now {
            (fire_at, (fire_at - now).to_std().unwrap_or(Duration::ZERO))
        } else if due > now {
            let near = chrono::Duration::from_std(config.near_delay).unwrap_or(chrono::Duration::zero());
            (now + near, config.near_delay)
        } else {
            return self.skip(task, SkipReason::Overdue);
        };

        let first_segment = delay.min(config.delay_ceiling);

        let mut state = self.inner.lock();
        if state.shut_down {
            drop(state);
            return self.skip(task, SkipReason::ShuttingDown);
        }

        state.next_generation += 1;
        let generation = state.next_generation;

        let handle = self.inner.timers.spawn(run_timer(
            Arc::clone(&self.inner),
            task.id.clone(),
            generation,
            Instant::now() + delay,
        ));

        let replaced = state.pending.insert(
            task.id.clone(),
            ArmedTimer {
                reminder: PendingReminder {
                    task_id: task.id.clone(),
                    fire_at,
                    generation,
                },
                handle,
            },
        );
        if let Some(old) = replaced {
            old.handle.abort();
        }
        drop(state);

        info!(
            task_id = %task.id,
            fire_at = %fire_at,
            delay_secs = delay.as_secs(),
            generation,
            "Reminder armed"
        );

        ScheduleOutcome::Armed {
            delay,
            first_segment,
            fire_at,
            generation,
        }
    }

    /// Drop the pending reminder for `task_id`, if any.
    ///
    /// Returns true if a reminder was pending.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        let removed = self.inner.lock().pending.remove(task_id);
        match removed {
            Some(armed) => {
                armed.handle.abort();
                debug!(task_id = %task_id, generation = armed.reminder.generation, "Reminder cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel and re-arm if the task is still eligible.
    pub fn reschedule(&self, task: &Task) -> ScheduleOutcome {
        self.cancel(&task.id);
        self.schedule(task)
    }

    /// Re-derive pending reminders from the store. Returns how many were armed.
    pub async fn restore(&self) -> Result<usize, StoreError> {
        let tasks = self.inner.store.list().await?;
        let now = self.inner.clock.now();

        let armed = tasks
            .iter()
            .filter(|task| task.is_reminder_eligible(now))
            .filter(|task| self.schedule(task).is_armed())
            .count();

        info!(armed, total = tasks.len(), "Reminders restored");
        Ok(armed)
    }

    /// Abort every pending timer, refuse further scheduling and wait for
    /// reminders that already fired to finish delivering.
    pub async fn shutdown(&self) {
        let drained: Vec<ArmedTimer> = {
            let mut state = self.inner.lock();
            state.shut_down = true;
            state.pending.drain().map(|(_, armed)| armed).collect()
        };

        for armed in &drained {
            armed.handle.abort();
        }

        self.inner.timers.close();
        if self.inner.timers.len() > drained.len() {
            info!("Waiting for in-flight reminders to finish");
        }
        self.inner.timers.wait().await;

        info!(aborted = drained.len(), "Reminder scheduler shut down");
    }

    /// The pending reminder for `task_id`, if any.
    pub fn pending(&self, task_id: &TaskId) -> Option<PendingReminder> {
        self.inner
            .lock()
            .pending
            .get(task_id)
            .map(|armed| armed.reminder.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    fn skip(&self, task: &Task, reason: SkipReason) -> ScheduleOutcome {
        info!(task_id = %task.id, reason = ?reason, "Reminder not scheduled");
        ScheduleOutcome::Skipped(reason)
    }
}

/// Sleep in ceiling-sized segments until `deadline`, then fire.
async fn run_timer(inner: Arc<Inner>, task_id: TaskId, generation: u64, deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        tokio::time::sleep((deadline - now).min(inner.config.delay_ceiling)).await;

        if !inner.is_current(&task_id, generation) {
            return;
        }
        if Instant::now() < deadline {
            debug!(task_id = %task_id, generation, "Re-arming reminder segment");
        }
    }

    inner.fire(task_id, generation).await;
}
