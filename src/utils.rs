//! Platform vocabulary (job statuses, job types) and value parsing helpers.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Job types accepted by `POST jobs`.
pub const JOB_TYPES: [&str; 7] = [
    "binary",
    "binary_exp",
    "nogpu",
    "pytorch",
    "pytorch2",
    "pytorch_elastic",
    "spark",
];

/// Job status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[value(rename_all = "PascalCase")]
pub enum JobStatus {
    Completed,
    Completing,
    Deleted,
    Failed,
    Pending,
    Running,
    Stopped,
    Succeeded,
    Terminated,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "Completed",
            JobStatus::Completing => "Completing",
            JobStatus::Deleted => "Deleted",
            JobStatus::Failed => "Failed",
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Stopped => "Stopped",
            JobStatus::Succeeded => "Succeeded",
            JobStatus::Terminated => "Terminated",
        }
    }

    /// Parse a status name. The API is not consistent about casing.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "completed" => Some(JobStatus::Completed),
            "completing" => Some(JobStatus::Completing),
            "deleted" => Some(JobStatus::Deleted),
            "failed" => Some(JobStatus::Failed),
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "stopped" => Some(JobStatus::Stopped),
            "succeeded" => Some(JobStatus::Succeeded),
            "terminated" => Some(JobStatus::Terminated),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pull the `status` field out of a job status response.
///
/// Non-object bodies (an error text, a bare string) are returned as-is so the
/// caller can echo whatever the server said.
pub fn extract_status(body: &Value) -> String {
    match body {
        Value::Object(map) => match map.get("status") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn duration_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)(?:\.\d+)?\s*s?\s*$").ok())
        .as_ref()
}

/// Parse a duration in seconds: `761461`, `"761461"` or `"761461s"`.
///
/// Fractional seconds are truncated; anything else yields `None`.
pub fn parse_duration_secs(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => duration_regex()?
            .captures(s)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }
}
