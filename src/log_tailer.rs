//! Log Tailer: follows a job's logs from pending through running to done.
//!
//! The follower is a small state machine:
//!
//! ```text
//! WaitingForRun --(not pending)--> Streaming   (status is running)
//!                               \-> StaticFetch (anything else)
//! Streaming --(stream ends, still running)--> Streaming (reopen, skip seen)
//!           --(stream ends, not running)----> Done
//! StaticFetch ------------------------------> Done
//! ```
//!
//! On reopen the new stream is assumed to replay the log from the start, so
//! as many chunks as were already emitted are swallowed. The dedup is by
//! position only and breaks if the server rechunks the replay.

use crate::client::response::Normalized;
use crate::client::retry::Sleeper;
use crate::error::Result;
use crate::job_manager::{JobManager, LogQuery};
use crate::status_monitor::{is_running, StatusMonitor};
use crate::utils::extract_status;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Pause before reopening the stream of a job that is still running.
const REOPEN_DELAY: Duration = Duration::from_secs(1);

/// Boxed chunk iterator returned by a [`LogSource`].
pub type Chunks<'s> = Box<dyn Iterator<Item = Result<String>> + 's>;

/// Where a follow session reads status and logs from.
pub trait LogSource {
    fn status(&mut self) -> Result<String>;
    fn static_logs(&mut self) -> Result<Normalized>;
    fn open_stream(&mut self) -> Chunks<'_>;
}

/// One job's logs through the platform API.
pub struct JobLogSource<'a> {
    jobs: JobManager<'a>,
    name: String,
    region: String,
    query: LogQuery,
}

impl<'a> JobLogSource<'a> {
    pub fn new(jobs: JobManager<'a>, name: &str, region: &str, query: LogQuery) -> Self {
        Self {
            jobs,
            name: name.to_string(),
            region: region.to_string(),
            query,
        }
    }
}

impl LogSource for JobLogSource<'_> {
    fn status(&mut self) -> Result<String> {
        let response = self.jobs.get_job_status(&self.name, &self.region)?;
        Ok(match response.json() {
            Some(body) => extract_status(body),
            None => response.render(),
        })
    }

    fn static_logs(&mut self) -> Result<Normalized> {
        self.jobs.get_job_logs(&self.name, &self.region, self.query)
    }

    fn open_stream(&mut self) -> Chunks<'_> {
        Box::new(self.jobs.stream_job_logs(&self.name, &self.region, self.query))
    }
}

/// Something the user should see.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// A status observed while waiting for the job to start.
    Status(String),
    /// A piece of live log output.
    Chunk(String),
    /// The complete log of a job that is not running.
    Static(Normalized),
}

/// Follow-session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    WaitingForRun,
    StaticFetch,
    Streaming,
    Done,
}

/// Drives one follow session over a [`LogSource`].
pub struct LogTailer<S> {
    source: S,
    sleeper: Arc<dyn Sleeper>,
    wait_for_run: bool,
    emitted: usize,
    streams_opened: u32,
}

impl<S: LogSource> LogTailer<S> {
    pub fn new(source: S, sleeper: Arc<dyn Sleeper>, wait_for_run: bool) -> Self {
        Self {
            source,
            sleeper,
            wait_for_run,
            emitted: 0,
            streams_opened: 0,
        }
    }

    /// Total live chunks emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Run the session to completion, handing every event to `emit`.
    ///
    /// A streaming failure aborts the session with the error.
    pub fn follow<F>(&mut self, mut emit: F) -> Result<FollowState>
    where
        F: FnMut(LogEvent) -> Result<()>,
    {
        let mut status = String::new();
        let mut state = if self.wait_for_run {
            FollowState::WaitingForRun
        } else {
            status = self.source.status()?;
            next_state(&status)
        };

        loop {
            debug!("follow state {:?} (status {:?})", state, status);
            state = match state {
                FollowState::WaitingForRun => {
                    let monitor = StatusMonitor::new(Arc::clone(&self.sleeper));
                    let source = &mut self.source;
                    status = monitor.wait_while_pending(
                        || source.status(),
                        |pending| emit(LogEvent::Status(pending.to_string())),
                    )?;
                    next_state(&status)
                }
                FollowState::StaticFetch => {
                    emit(LogEvent::Static(self.source.static_logs()?))?;
                    FollowState::Done
                }
                FollowState::Streaming => {
                    self.stream_once(&mut emit)?;
                    status = self.source.status()?;
                    if is_running(&status) {
                        debug!(
                            "stream ended but job is still running, reopening and skipping {} chunk(s)",
                            self.emitted
                        );
                        self.sleeper.sleep(REOPEN_DELAY);
                        FollowState::Streaming
                    } else {
                        FollowState::Done
                    }
                }
                FollowState::Done => return Ok(FollowState::Done),
            };
        }
    }

    /// Consume one stream, swallowing the chunks a previous stream already showed.
    ///
    /// The skip is positional: it drops as many leading chunks as were emitted
    /// so far, whatever their content. After `[A, B, C]` a reopened `[D, E]`
    /// is swallowed whole, so the output stays `A, B, C` and `E` is never shown.
    fn stream_once<F>(&mut self, emit: &mut F) -> Result<()>
    where
        F: FnMut(LogEvent) -> Result<()>,
    {
        let mut skip = self.emitted;
        self.streams_opened += 1;
        let mut new_chunks = 0;
        for chunk in self.source.open_stream() {
            let chunk = chunk?;
            if skip > 0 {
                skip -= 1;
                continue;
            }
            new_chunks += 1;
            emit(LogEvent::Chunk(chunk))?;
        }
        self.emitted += new_chunks;
        debug!(
            "stream #{} exhausted after {} new chunk(s)",
            self.streams_opened, new_chunks
        );
        Ok(())
    }
}

fn next_state(status: &str) -> FollowState {
    if is_running(status) {
        FollowState::Streaming
    } else {
        FollowState::StaticFetch
    }
}
