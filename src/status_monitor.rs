//! Status Monitor for waiting on a pending job.

use crate::client::retry::Sleeper;
use crate::error::Result;
use crate::utils::JobStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Base polling interval, scaled linearly by the poll iteration.
const POLL_INTERVAL_SECS: f64 = 1.0;
const POLL_OFFSET: f64 = 0.2;

/// Whether a status string means the job has not started yet.
pub fn is_pending(status: &str) -> bool {
    JobStatus::from_name(status) == Some(JobStatus::Pending)
}

/// Whether a status string means the job is producing logs right now.
pub fn is_running(status: &str) -> bool {
    JobStatus::from_name(status) == Some(JobStatus::Running)
}

/// Polls a job status with a linearly growing delay while it is pending.
pub struct StatusMonitor {
    sleeper: Arc<dyn Sleeper>,
}

impl StatusMonitor {
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    /// Delay after poll number `iteration` (0-based): 0.2s, 1.2s, 2.2s, ...
    pub fn poll_delay(iteration: u32) -> Duration {
        Duration::from_secs_f64(POLL_INTERVAL_SECS * (f64::from(iteration) + POLL_OFFSET))
    }

    /// Poll until the status is no longer pending and return it.
    ///
    /// Every pending status observed is reported through `on_pending` before
    /// sleeping.
    pub fn wait_while_pending<P, F>(&self, mut poll: P, mut on_pending: F) -> Result<String>
    where
        P: FnMut() -> Result<String>,
        F: FnMut(&str) -> Result<()>,
    {
        let mut status = poll()?;
        let mut iteration = 0;
        while is_pending(&status) {
            on_pending(&status)?;
            let delay = Self::poll_delay(iteration);
            debug!("job is {}, polling again in {:?}", status, delay);
            self.sleeper.sleep(delay);
            iteration += 1;
            status = poll()?;
        }
        Ok(status)
    }
}
