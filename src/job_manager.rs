//! Job Manager for training job lifecycle calls against the platform API.

use crate::client::response::Normalized;
use crate::client::stream::{ChunkStream, HttpOpener};
use crate::client::transport::Request;
use crate::client::ApiClient;
use crate::error::Result;
use crate::utils::JobStatus;
use serde_json::Value;

/// Options for a log fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// Only the last `tail` lines; 0 means everything.
    pub tail: u32,
    pub verbose: bool,
}

/// Options for `GET jobs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub region: String,
    pub allocation_name: Option<String>,
    pub statuses: Vec<JobStatus>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            region: String::new(),
            allocation_name: None,
            statuses: Vec::new(),
            limit: 6000,
            offset: 0,
        }
    }
}

/// Training job operations. Every call returns the normalized response;
/// HTTP errors are part of the result, not an `Err`.
#[derive(Clone, Copy)]
pub struct JobManager<'a> {
    client: &'a ApiClient,
}

impl<'a> JobManager<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Submit a job described by a prepared payload.
    pub fn submit_job(&self, payload: Value) -> Result<Normalized> {
        self.client.call(&Request::post("jobs").json(payload))
    }

    pub fn get_job_status(&self, name: &str, region: &str) -> Result<Normalized> {
        self.client
            .call(&Request::get(format!("jobs/{}", name)).query("region", region))
    }

    pub fn get_job_logs(&self, name: &str, region: &str, query: LogQuery) -> Result<Normalized> {
        self.client.call(&logs_request(name, region, query))
    }

    /// Open a live log stream for a running job.
    pub fn stream_job_logs(&self, name: &str, region: &str, query: LogQuery) -> ChunkStream<HttpOpener<'a>> {
        self.client
            .stream(logs_request(name, region, query).query("stream", "true"))
    }

    pub fn list_jobs(&self, query: &ListQuery) -> Result<Normalized> {
        let mut request = Request::get("jobs")
            .query("region", &query.region)
            .query_opt("allocation_name", query.allocation_name.as_deref());
        for status in &query.statuses {
            request = request.query("status", status);
        }
        let request = request
            .query("limit", query.limit)
            .query("offset", query.offset);
        self.client.call(&request)
    }

    /// Pods of a distributed (spark, elastic pytorch) job.
    pub fn get_pods(&self, name: &str, region: &str) -> Result<Normalized> {
        self.client
            .call(&Request::get(format!("jobs/{}/spark/pods", name)).query("region", region))
    }

    pub fn kill_job(&self, name: &str, region: &str) -> Result<Normalized> {
        self.client
            .call(&Request::delete(format!("jobs/{}", name)).query("region", region))
    }

    pub fn restart_job(&self, name: &str) -> Result<Normalized> {
        self.client
            .call(&Request::post("jobs/restart").json(serde_json::json!({ "job_name": name })))
    }
}

fn logs_request(name: &str, region: &str, query: LogQuery) -> Request {
    Request::get(format!("jobs/{}/logs", name))
        .query("region", region)
        .query("tail", query.tail)
        .query("verbose", query.verbose)
}
