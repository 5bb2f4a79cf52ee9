//! Data-transfer service: connectors (storage endpoints) and transfers
//! (scheduled copies between two connectors).

use crate::client::response::{Body, Normalized};
use crate::client::transport::Request;
use crate::client::ApiClient;
use crate::error::{ApiError, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

/// Every connector type the service reports.
pub const ALL_CONNECTOR_TYPES: [&str; 8] = [
    "s3custom",
    "s3evolution",
    "s3mlspace",
    "nfs",
    "nfsprivate",
    "postgresql",
    "mysql",
    "mssql",
];

/// Connector types a user may create, update or toggle.
pub const CUSTOM_CONNECTOR_TYPES: [&str; 4] = ["s3custom", "postgresql", "mysql", "mssql"];

pub fn is_type_valid(typ: &str) -> bool {
    ALL_CONNECTOR_TYPES.contains(&typ)
}

pub fn is_custom_type_valid(typ: &str) -> bool {
    CUSTOM_CONNECTOR_TYPES.contains(&typ)
}

fn check_custom_type(typ: &str) -> Result<()> {
    if is_custom_type_valid(typ) {
        Ok(())
    } else {
        Err(unknown_type(typ, &CUSTOM_CONNECTOR_TYPES))
    }
}

fn unknown_type(typ: &str, allowed: &[&str]) -> ApiError {
    ApiError::Config(format!(
        "unknown connector type '{}' (expected one of: {})",
        typ,
        allowed.join(", ")
    ))
}

/// Whether every id parses as a UUID.
pub fn are_ids_valid<S: AsRef<str>>(ids: &[S]) -> bool {
    ids.iter().all(|id| Uuid::parse_str(id.as_ref()).is_ok())
}

/// Connectors of one `source_type`; an empty type keeps everything.
pub fn filter_by_type(connectors: &[Value], typ: &str) -> Vec<Value> {
    connectors
        .iter()
        .filter(|c| typ.is_empty() || c.get("source_type").and_then(Value::as_str) == Some(typ))
        .cloned()
        .collect()
}

/// Connectors whose `connector_id` is one of `ids`.
pub fn filter_by_connector_ids<S: AsRef<str>>(connectors: &[Value], ids: &[S]) -> Vec<Value> {
    connectors
        .iter()
        .filter(|c| {
            c.get("connector_id")
                .and_then(Value::as_str)
                .map(|id| ids.iter().any(|wanted| wanted.as_ref() == id))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// One 1-based page of a list. Zero per page, or a page past the end, is empty.
pub fn paginate(data: &Value, page: usize, per_page: usize) -> Result<Vec<Value>> {
    let Value::Array(items) = data else {
        return Err(ApiError::RenderingInput(
            "pagination needs a list of records".to_string(),
        ));
    };
    if per_page == 0 || page == 0 {
        return Ok(Vec::new());
    }
    Ok(items
        .iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .cloned()
        .collect())
}

/// Connector and transfer operations over an authenticated client.
#[derive(Clone, Copy)]
pub struct DtsManager<'a> {
    client: &'a ApiClient,
}

impl<'a> DtsManager<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Connector types the service can create, with their parameter schemas.
    pub fn conn_sources(&self) -> Result<Normalized> {
        self.client.call(&Request::get("dts/connectors/sources"))
    }

    /// List connectors, narrowed locally by ids and type.
    pub fn conn_list<S: AsRef<str>>(&self, ids: &[S], typ: &str) -> Result<Normalized> {
        if !typ.is_empty() && !is_type_valid(typ) {
            return Err(unknown_type(typ, &ALL_CONNECTOR_TYPES));
        }
        let mut response = self.client.call(&Request::get("dts/connectors"))?;
        if let Body::Json(Value::Array(items)) = &response.body {
            let mut items = filter_by_type(items, typ);
            if !ids.is_empty() {
                items = filter_by_connector_ids(&items, ids);
            }
            response.body = Body::Json(Value::Array(items));
        }
        Ok(response)
    }

    pub fn conn_create(&self, connector: Value, public: bool) -> Result<Normalized> {
        let typ = connector.get("source_type").and_then(Value::as_str).unwrap_or("");
        check_custom_type(typ)?;
        self.client.call(
            &Request::post("dts/connectors")
                .query("public", public)
                .json(connector),
        )
    }

    pub fn conn_update(&self, id: &str, typ: &str, parameters: Value) -> Result<Normalized> {
        check_custom_type(typ)?;
        self.client.call(
            &Request::put(format!("dts/connectors/{}", id))
                .json(json!({ "source_type": typ, "parameters": parameters })),
        )
    }

    pub fn conn_activate(&self, id: &str, typ: &str) -> Result<Normalized> {
        self.conn_toggle(id, typ, "activate")
    }

    pub fn conn_deactivate(&self, id: &str, typ: &str) -> Result<Normalized> {
        self.conn_toggle(id, typ, "deactivate")
    }

    fn conn_toggle(&self, id: &str, typ: &str, action: &str) -> Result<Normalized> {
        check_custom_type(typ)?;
        self.client.call(
            &Request::post(format!("dts/connectors/{}/{}", id, action))
                .json(json!({ "source_type": typ })),
        )
    }

    pub fn conn_delete<S: AsRef<str>>(&self, ids: &[S]) -> Result<Normalized> {
        let mut request = Request::delete("dts/connectors");
        for id in ids {
            request = request.query("connector_ids", id.as_ref());
        }
        self.client.call(&request)
    }

    pub fn transfer_list(&self) -> Result<Normalized> {
        self.client.call(&Request::get("dts/transfers"))
    }

    pub fn transfer_get(&self, id: &str) -> Result<Normalized> {
        self.client.call(&Request::get(format!("dts/transfers/{}", id)))
    }

    pub fn transfer_create(&self, transfer: Value) -> Result<Normalized> {
        self.client.call(&Request::post("dts/transfers").json(transfer))
    }

    pub fn transfer_update(&self, id: &str, params: Value) -> Result<Normalized> {
        self.client
            .call(&Request::put(format!("dts/transfers/{}", id)).json(params))
    }

    pub fn transfer_delete<S: AsRef<str>>(&self, ids: &[S]) -> Result<Normalized> {
        let mut request = Request::delete("dts/transfers");
        for id in ids {
            request = request.query("transfer_ids", id.as_ref());
        }
        self.client.call(&request)
    }

    /// Enable or disable a transfer's schedule.
    pub fn transfer_switch(&self, id: &str, active: bool) -> Result<Normalized> {
        self.client.call(
            &Request::post(format!("dts/transfers/{}/switch", id)).json(json!({ "active": active })),
        )
    }

    /// Cancel the run scheduled for `execution_date`.
    pub fn transfer_cancel(&self, id: &str, execution_date: DateTime<Utc>) -> Result<Normalized> {
        self.client.call(
            &Request::post(format!("dts/transfers/{}/cancel", id))
                .json(json!({ "execution_date": execution_date.to_rfc3339() })),
        )
    }

    pub fn transfer_logs(&self, id: &str, history_id: Option<&str>) -> Result<Normalized> {
        self.client.call(
            &Request::get(format!("dts/transfers/{}/logs", id)).query_opt("history_id", history_id),
        )
    }

    pub fn transfer_history(&self, id: &str, source_name: Option<&str>) -> Result<Normalized> {
        self.client.call(
            &Request::get(format!("dts/transfers/{}/history", id))
                .query_opt("source_name", source_name),
        )
    }
}
