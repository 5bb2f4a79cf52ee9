//! Response normalizer: turns every HTTP outcome into a renderable body.
//!
//! Success and error responses take the same path. An error status is kept
//! alongside the body so callers can choose an exit code, but it is never
//! raised.

use crate::error::Result;
use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;
use tracing::debug;

/// How the user wants results printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputPreference {
    /// Pretty-printed JSON for object results
    Json,
    /// Plain text representation
    Text,
    /// No preference: results are passed through verbatim
    #[default]
    #[value(skip)]
    Unset,
}

impl OutputPreference {
    /// Parse a stored preference (profile files); unknown values mean unset.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "text" => Self::Text,
            _ => Self::Unset,
        }
    }
}

/// A response body, parsed according to its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl Body {
    /// Classify raw body text by its `Content-Type`.
    pub fn from_parts(content_type: Option<&str>, text: String) -> Self {
        let is_json = content_type
            .map(|ct| ct.trim().to_lowercase().starts_with("application/json"))
            .unwrap_or(false);
        if is_json {
            match serde_json::from_str(&text) {
                Ok(value) => return Body::Json(value),
                Err(e) => debug!("response claims JSON but does not parse: {}", e),
            }
        }
        Body::Text(text)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(v) => Some(v),
            Body::Text(_) => None,
        }
    }
}

/// A normalized API result together with the preference used to render it.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub status: u16,
    pub body: Body,
    pub preference: OutputPreference,
}

impl Normalized {
    /// Consume an HTTP response, success or error alike.
    pub fn from_response(response: Response, preference: OutputPreference) -> Result<Self> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text()?;
        if !status.is_success() {
            debug!("API answered {}: {}", status, text);
        }

        Ok(Self {
            status: status.as_u16(),
            body: Body::from_parts(content_type.as_deref(), text),
            preference,
        })
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    pub fn json(&self) -> Option<&Value> {
        self.body.as_json()
    }

    pub fn render(&self) -> String {
        render(&self.body, self.preference)
    }
}

/// Render a body for the terminal.
///
/// `json` pretty-prints objects with a four-space indent and leaves non-ASCII
/// characters unescaped; everything else is shown in its plain form.
pub fn render(body: &Body, preference: OutputPreference) -> String {
    match (body, preference) {
        (Body::Json(value @ Value::Object(_)), OutputPreference::Json) => pretty_json(value),
        (Body::Json(Value::String(s)), _) => s.clone(),
        (Body::Json(value), _) => value.to_string(),
        (Body::Text(text), _) => text.clone(),
    }
}

/// Four-space indented JSON.
pub fn pretty_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    match value.serialize(&mut ser) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_preference_pretty_prints_objects() {
        let body = Body::Json(json!({"a": "тест"}));
        let out = render(&body, OutputPreference::Json);
        assert_eq!(out, "{\n    \"a\": \"тест\"\n}");
        assert!(!out.contains("\\u"));
    }

    #[test]
    fn test_json_preference_leaves_lists_compact() {
        let body = Body::Json(json!([{"source_type": "s3mlspace"}]));
        assert_eq!(
            render(&body, OutputPreference::Json),
            r#"[{"source_type":"s3mlspace"}]"#
        );
    }

    #[test]
    fn test_text_and_unset_pass_through() {
        let body = Body::Json(json!({"status": "running"}));
        assert_eq!(render(&body, OutputPreference::Text), r#"{"status":"running"}"#);
        assert_eq!(render(&body, OutputPreference::Unset), r#"{"status":"running"}"#);
        let text = Body::Text("plain log".to_string());
        assert_eq!(render(&text, OutputPreference::Json), "plain log");
    }

    #[test]
    fn test_content_type_drives_parsing() {
        assert_eq!(
            Body::from_parts(Some("application/json; charset=utf-8"), "{\"a\":1}".into()),
            Body::Json(json!({"a": 1}))
        );
        assert_eq!(
            Body::from_parts(Some("text/plain"), "{\"a\":1}".into()),
            Body::Text("{\"a\":1}".into())
        );
        assert_eq!(
            Body::from_parts(Some("application/json"), "not json".into()),
            Body::Text("not json".into())
        );
        assert_eq!(Body::from_parts(None, "x".into()), Body::Text("x".into()));
    }

    #[test]
    fn test_output_preference_from_name() {
        assert_eq!(OutputPreference::from_name("JSON"), OutputPreference::Json);
        assert_eq!(OutputPreference::from_name("text"), OutputPreference::Text);
        assert_eq!(OutputPreference::from_name(""), OutputPreference::Unset);
    }

    #[test]
    fn test_error_response_is_normalized_not_raised() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/jobs/missing")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "не найдено"}"#)
            .create();

        let response = reqwest::blocking::get(format!("{}/jobs/missing", server.url())).unwrap();
        let normalized = Normalized::from_response(response, OutputPreference::Json).unwrap();

        assert!(normalized.is_error());
        assert_eq!(normalized.render(), "{\n    \"detail\": \"не найдено\"\n}");
    }
}
