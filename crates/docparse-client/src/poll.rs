//! Job status model and the polling state machine
//!
//! ```text
//! SUBMITTED -> POLLING -> { SUCCEEDED, FAILED, TIMED_OUT }
//! ```
//!
//! POLLING is the only non-terminal phase. On every observation the
//! timeout budget is checked before the status is interpreted, so a job
//! that reports success after the budget ran out still times out.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};

/// Opaque job identifier assigned by the service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side job status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Success,
    Completed,
    Error,
    /// Anything outside the protocol, kept verbatim
    Other(String),
}

impl JobStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "PENDING" => Self::Pending,
            "SUCCESS" => Self::Success,
            "COMPLETED" => Self::Completed,
            "ERROR" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
            Self::Other(s) => s,
        }
    }

    /// `SUCCESS` and `COMPLETED` both end the job successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Completed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response from `GET job/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Raw status string
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub error_code: Option<String>,

    #[serde(default)]
    pub error_message: Option<String>,
}

impl JobStatusResponse {
    pub fn job_status(&self) -> JobStatus {
        JobStatus::parse(&self.status)
    }
}

/// Response from `POST upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: JobId,

    #[serde(default)]
    pub status: Option<String>,
}

/// Client-side phase of a tracked job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

/// What the poll loop should do after an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// Sleep for another interval and query again
    Continue,
    /// The job succeeded; fetch the result
    Done,
}

/// Tracks one job from submission to a terminal phase
#[derive(Debug, Clone)]
pub struct JobTracker {
    job_id: JobId,
    started: Instant,
    check_interval: Duration,
    max_timeout: Duration,
    phase: JobPhase,
    polls: u32,
}

impl JobTracker {
    /// Start tracking; the timeout budget is measured from now
    pub fn start(job_id: JobId, check_interval: Duration, max_timeout: Duration) -> Self {
        Self {
            job_id,
            started: Instant::now(),
            check_interval,
            max_timeout,
            phase: JobPhase::Submitted,
            polls: 0,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Number of status responses observed so far
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Observe a status response using wall-clock elapsed time
    pub fn observe(&mut self, response: &JobStatusResponse) -> Result<PollStep> {
        let elapsed = self.elapsed();
        self.observe_at(elapsed, response)
    }

    /// Observe a status response at a given elapsed time
    ///
    /// Order matters: timeout, then the success set, then `ERROR`, then
    /// `PENDING`; anything else is unexpected.
    pub fn observe_at(
        &mut self,
        elapsed: Duration,
        response: &JobStatusResponse,
    ) -> Result<PollStep> {
        if self.phase.is_terminal() {
            return Err(ParseError::UnexpectedStatus(format!(
                "job {} already finished ({:?})",
                self.job_id, self.phase
            )));
        }

        self.polls += 1;
        self.phase = JobPhase::Polling;

        if elapsed > self.max_timeout {
            self.phase = JobPhase::TimedOut;
            return Err(ParseError::JobTimeout {
                job_id: self.job_id.to_string(),
                timeout: self.max_timeout,
            });
        }

        match response.job_status() {
            JobStatus::Success | JobStatus::Completed => {
                self.phase = JobPhase::Succeeded;
                Ok(PollStep::Done)
            }
            JobStatus::Error => {
                self.phase = JobPhase::Failed;
                Err(ParseError::job_failed(
                    response.error_code.as_deref(),
                    response.error_message.as_deref(),
                ))
            }
            JobStatus::Pending => Ok(PollStep::Continue),
            JobStatus::Other(status) => {
                self.phase = JobPhase::Failed;
                Err(ParseError::UnexpectedStatus(status))
            }
        }
    }
}
