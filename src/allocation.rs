//! Compute allocations of a workspace, their queues, and the instance types
//! each of them can schedule.

use crate::client::response::{pretty_json, Body, Normalized, OutputPreference};
use crate::client::transport::Request;
use crate::client::ApiClient;
use crate::error::Result;

pub struct AllocationManager<'a> {
    client: &'a ApiClient,
}

impl<'a> AllocationManager<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub fn list_allocations(&self, workspace_id: &str) -> Result<Normalized> {
        self.client.call(&Request::get(format!(
            "workspaces/v3/{}/allocations",
            workspace_id
        )))
    }

    pub fn allocation_instance_types(&self, allocation_id: &str) -> Result<Normalized> {
        self.client.call(&Request::get(format!(
            "allocations/{}/instance-types",
            allocation_id
        )))
    }

    pub fn list_queues(&self, workspace_id: &str, allocation_id: &str) -> Result<Normalized> {
        self.client.call(&Request::get(format!(
            "workspaces/v3/{}/allocations/{}/queues",
            workspace_id, allocation_id
        )))
    }

    pub fn queue_instance_types(&self, queue_id: &str) -> Result<Normalized> {
        self.client.call(&Request::get(format!(
            "queues/{}/instance-types",
            queue_id
        )))
    }
}

/// Listings come back as arrays, so `json` indents them like objects.
pub fn render_listing(response: &Normalized) -> String {
    match (&response.body, response.preference) {
        (Body::Json(value), OutputPreference::Json) if !value.is_string() => pretty_json(value),
        _ => response.render(),
    }
}
