//! Recurring background tasks on a cron cadence.
//!
//! DESIGN
//! ======
//! Each registered task gets its own driver loop, spawned once at server
//! start and independent of request handling. The loop sleeps until the next
//! fire time of a five-field cron expression, then hands the run to a
//! separate Tokio task so a panic inside the task body cannot take the loop
//! down with it.
//!
//! Overlap policy is skip-if-running: a tick that arrives while the previous
//! run is still in flight is logged and dropped, so background work never
//! piles up behind a slow dependency.
//!
//! ERROR HANDLING
//! ==============
//! Errors and panics are caught at the run boundary and logged. Neither
//! cancels future ticks.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// A unit of background work fired by the scheduler.
#[async_trait]
pub trait ScheduledTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<(), TaskError>;
}

// =============================================================================
// CADENCE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CadenceError {
    #[error("cron expression {expr:?} must have 5 fields, found {found}")]
    FieldCount { expr: String, found: usize },

    #[error("invalid cron expression {expr:?}: {message}")]
    Parse { expr: String, message: String },
}

/// Parsed five-field cron expression (minute, hour, day, month, weekday).
#[derive(Debug, Clone)]
pub struct Cadence {
    expression: String,
    schedule: Schedule,
}

impl Cadence {
    /// # Errors
    ///
    /// Returns an error unless `expr` is a valid five-field cron expression.
    pub fn parse(expr: &str) -> Result<Self, CadenceError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CadenceError::FieldCount { expr: expr.to_string(), found: fields.len() });
        }
        let expression = fields.join(" ");

        // The cron crate expects a leading seconds field.
        let schedule = Schedule::from_str(&format!("0 {expression}"))
            .map_err(|e| CadenceError::Parse { expr: expr.to_string(), message: e.to_string() })?;
        Ok(Self { expression, schedule })
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

// =============================================================================
// CLOCK
// =============================================================================

/// Wall-clock time advanced by Tokio's monotonic clock, so fire times are
/// computed in UTC while sleeps follow the runtime timer.
struct SchedulerClock {
    wall: DateTime<Utc>,
    started: Instant,
}

impl SchedulerClock {
    fn start() -> Self {
        Self { wall: Utc::now(), started: Instant::now() }
    }

    fn now(&self) -> DateTime<Utc> {
        self.wall + TimeDelta::from_std(self.started.elapsed()).unwrap_or(TimeDelta::zero())
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Owns the driver loops of all registered tasks. Dropping it stops them.
#[derive(Default)]
pub struct TaskScheduler {
    jobs: Vec<JoinHandle<()>>,
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        for job in &self.jobs {
            job.abort();
        }
    }
}

impl TaskScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the driver loop for `task`. Must be called within a Tokio runtime.
    pub fn add(&mut self, cadence: Cadence, task: Arc<dyn ScheduledTask>) {
        info!(task = task.name(), cadence = cadence.expression(), "recurring task scheduled");
        self.jobs.push(tokio::spawn(drive(cadence, task)));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Stop all driver loops. Runs already in flight finish on their own.
    pub fn shutdown(self) {
        info!(jobs = self.jobs.len(), "stopping task scheduler");
        drop(self);
    }
}

async fn drive(cadence: Cadence, task: Arc<dyn ScheduledTask>) {
    let clock = SchedulerClock::start();
    let in_flight = Arc::new(AtomicBool::new(false));
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = clock.now();
        let reference = last_fire.map_or(now, |last| last.max(now));
        let Some(next) = cadence.next_after(reference) else {
            warn!(task = task.name(), cadence = cadence.expression(), "cadence has no future fire times");
            return;
        };

        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(delay).await;
        last_fire = Some(next);

        if in_flight.swap(true, Ordering::AcqRel) {
            warn!(task = task.name(), scheduled_for = %next, "previous run still in progress; skipping tick");
            continue;
        }

        tokio::spawn(run_guarded(Arc::clone(&task), Arc::clone(&in_flight), next));
    }
}

async fn run_guarded(task: Arc<dyn ScheduledTask>, in_flight: Arc<AtomicBool>, scheduled_for: DateTime<Utc>) {
    let name = task.name();
    let run_id = Uuid::new_v4();
    let started = Instant::now();
    debug!(task = name, %run_id, %scheduled_for, "scheduled run starting");

    // Inner spawn turns a panic in the task body into a JoinError.
    let outcome = tokio::spawn(async move { task.run().await }).await;
    let elapsed_ms = started.elapsed().as_millis();

    match outcome {
        Ok(Ok(())) => debug!(task = name, %run_id, elapsed_ms, "scheduled run finished"),
        Ok(Err(e)) => error!(task = name, %run_id, elapsed_ms, error = %e, "scheduled run failed"),
        Err(e) if e.is_panic() => error!(task = name, %run_id, elapsed_ms, "scheduled run panicked"),
        Err(e) => warn!(task = name, %run_id, error = %e, "scheduled run cancelled"),
    }

    in_flight.store(false, Ordering::Release);
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
