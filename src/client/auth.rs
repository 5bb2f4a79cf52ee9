//! Client-credential exchange and session headers.

use crate::client::transport::{Request, Transport};
use crate::error::{ApiError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use tracing::debug;

pub const AUTH_ENDPOINT: &str = "service_auth";

const WORKSPACE_HEADER: &str = "x-workspace-id";
const API_KEY_HEADER: &str = "x-api-key";

/// Exchange a key pair for an access token.
///
/// Any failure here is an [`ApiError::Authorization`]; it is never retried
/// beyond what the transport already does for 5xx answers.
pub fn authenticate(transport: &Transport, client_id: &str, client_secret: &str) -> Result<String> {
    let request = Request::post(AUTH_ENDPOINT).json(json!({
        "client_id": client_id,
        "client_secret": client_secret,
    }));

    let response = transport
        .send(&request)
        .map_err(|e| ApiError::Authorization(e.to_string()))?;
    let status = response.status();
    let text = response
        .text()
        .map_err(|e| ApiError::Authorization(e.to_string()))?;

    if !status.is_success() {
        debug!("token exchange rejected with {}: {}", status, text);
        return Err(ApiError::Authorization(format!("{} {}", status, text.trim())));
    }

    let body: Value = serde_json::from_str(&text)
        .map_err(|e| ApiError::Authorization(format!("unreadable token response: {}", e)))?;
    body.pointer("/token/access_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::Authorization("token response has no access_token".to_string()))
}

/// Headers attached to every authenticated request.
pub fn session_headers(token: &str, workspace_id: &str, api_key: &str) -> Result<HeaderMap> {
    let mut authorization =
        HeaderValue::from_str(token).map_err(|_| ApiError::InvalidHeader("authorization"))?;
    authorization.set_sensitive(true);
    let workspace =
        HeaderValue::from_str(workspace_id).map_err(|_| ApiError::InvalidHeader("x-workspace-id"))?;
    let mut api_key =
        HeaderValue::from_str(api_key).map_err(|_| ApiError::InvalidHeader("x-api-key"))?;
    api_key.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(WORKSPACE_HEADER, workspace);
    headers.insert(API_KEY_HEADER, api_key);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::retry::{RecordingSleeper, RetryPolicy};
    use crate::client::transport::TransportConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn transport(url: &str) -> Transport {
        let config = TransportConfig {
            endpoint_url: url.to_string(),
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(5),
            ssl_verify: true,
            retry: RetryPolicy::new(1, 0.0),
        };
        Transport::new(&config, Arc::new(RecordingSleeper::new())).unwrap()
    }

    #[test]
    fn test_token_extracted_from_nested_path() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/service_auth")
            .match_body(mockito::Matcher::Json(json!({
                "client_id": "id",
                "client_secret": "secret",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": {"access_token": "TOKEN-1", "expires_in": 3600}}"#)
            .create();

        let token = authenticate(&transport(&server.url()), "id", "secret").unwrap();
        assert_eq!(token, "TOKEN-1");
        mock.assert();
    }

    #[test]
    fn test_rejected_credentials_are_authorization_errors() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/service_auth")
            .with_status(401)
            .with_body("invalid credentials")
            .create();

        let err = authenticate(&transport(&server.url()), "id", "bad").unwrap_err();
        match err {
            ApiError::Authorization(msg) => assert!(msg.contains("invalid credentials")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_token_is_authorization_error() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/service_auth")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": {}}"#)
            .create();

        let err = authenticate(&transport(&server.url()), "id", "secret").unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
    }

    #[test]
    fn test_session_headers() {
        let headers = session_headers("TOKEN", "ws", "key").unwrap();
        assert_eq!(headers[AUTHORIZATION], "TOKEN");
        assert_eq!(headers["x-workspace-id"], "ws");
        assert_eq!(headers["x-api-key"], "key");
        assert!(session_headers("bad\ntoken", "ws", "key").is_err());
    }
}
