//! Authenticated API client: configuration, session setup and the two call
//! shapes every domain manager uses (normalized request and chunk stream).

pub mod auth;
pub mod response;
pub mod retry;
pub mod stream;
pub mod transport;

use crate::error::Result;
use crate::profile::Profile;
use crate::settings::Settings;
use response::{Normalized, OutputPreference};
use retry::{RetryPolicy, Sleeper, ThreadSleeper};
use std::sync::Arc;
use stream::{ChunkStream, HttpOpener};
use tracing::debug;
use transport::{Request, Transport, TransportConfig};

/// Key pair plus the workspace headers sent with every call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub key_id: String,
    pub key_secret: String,
    pub workspace_id: String,
    pub api_key: String,
}

impl From<&Profile> for Credentials {
    fn from(profile: &Profile) -> Self {
        Self {
            key_id: profile.key_id.clone(),
            key_secret: profile.key_secret.clone(),
            workspace_id: profile.x_workspace_id.clone(),
            api_key: profile.x_api_key.clone(),
        }
    }
}

/// Everything needed to open one client session.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    pub credentials: Credentials,
    /// Region used when a command does not name one; may be empty.
    pub region: String,
    pub output: OutputPreference,
}

impl ClientConfig {
    pub fn builder(settings: Settings, profile: Profile) -> ClientConfigBuilder {
        ClientConfigBuilder {
            settings,
            profile,
            endpoint_url: None,
            region: None,
            output: None,
        }
    }
}

/// Resolves a [`ClientConfig`] from the settings defaults, a stored profile
/// and command-line overrides, in increasing order of precedence.
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    settings: Settings,
    profile: Profile,
    endpoint_url: Option<String>,
    region: Option<String>,
    output: Option<OutputPreference>,
}

impl ClientConfigBuilder {
    pub fn endpoint_url(mut self, endpoint_url: Option<String>) -> Self {
        self.endpoint_url = endpoint_url.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn region(mut self, region: Option<String>) -> Self {
        self.region = region.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn output(mut self, output: Option<OutputPreference>) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> ClientConfig {
        let endpoint_url = self
            .endpoint_url
            .or_else(|| self.profile.endpoint_url.clone())
            .unwrap_or_else(|| self.settings.endpoint_url.clone());
        let region = self
            .region
            .or_else(|| self.profile.region.clone())
            .unwrap_or_default();
        let output = self.output.unwrap_or_else(|| {
            self.profile
                .output
                .as_deref()
                .map(OutputPreference::from_name)
                .unwrap_or_default()
        });

        ClientConfig {
            transport: TransportConfig {
                endpoint_url,
                connect_timeout: self.settings.connect_timeout,
                read_timeout: self.settings.read_timeout,
                ssl_verify: self.settings.ssl_verify,
                retry: RetryPolicy::new(self.settings.max_retries, self.settings.backoff_factor),
            },
            credentials: Credentials::from(&self.profile),
            region,
            output,
        }
    }
}

/// One authenticated session. Owns the connection pool exclusively.
pub struct ApiClient {
    transport: Transport,
    output: OutputPreference,
}

impl ApiClient {
    /// Authenticate and build a session that sleeps for real between retries.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        Self::connect_with(config, Arc::new(ThreadSleeper))
    }

    pub fn connect_with(config: &ClientConfig, sleeper: Arc<dyn Sleeper>) -> Result<Self> {
        let transport = Transport::new(&config.transport, sleeper)?;
        let token = auth::authenticate(
            &transport,
            &config.credentials.key_id,
            &config.credentials.key_secret,
        )?;
        let headers = auth::session_headers(
            &token,
            &config.credentials.workspace_id,
            &config.credentials.api_key,
        )?;
        debug!("authenticated against {}", config.transport.endpoint_url);

        Ok(Self {
            transport: transport.with_session_headers(headers),
            output: config.output,
        })
    }

    /// Send a domain request; HTTP errors come back normalized, not raised.
    pub fn call(&self, request: &Request) -> Result<Normalized> {
        let response = self.transport.send(request)?;
        Normalized::from_response(response, self.output)
    }

    /// Lazily stream a response body as text chunks.
    pub fn stream(&self, request: Request) -> ChunkStream<HttpOpener<'_>> {
        ChunkStream::new(
            HttpOpener::new(&self.transport, request),
            self.transport.retry_policy(),
            self.transport.sleeper(),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ApiError;
    use retry::RecordingSleeper;
    use std::time::Duration;

    /// Mock the token exchange and connect a client to `server`.
    pub(crate) fn connected(server: &mut mockito::Server) -> ApiClient {
        connected_with(server, OutputPreference::Json)
    }

    pub(crate) fn connected_with(server: &mut mockito::Server, output: OutputPreference) -> ApiClient {
        let _auth = server
            .mock("POST", "/service_auth")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": {"access_token": "TOKEN"}}"#)
            .create();
        let config = ClientConfig {
            transport: TransportConfig {
                endpoint_url: server.url(),
                connect_timeout: Duration::from_secs(2),
                read_timeout: Duration::from_secs(5),
                ssl_verify: true,
                retry: RetryPolicy::new(2, 0.1),
            },
            credentials: Credentials {
                key_id: "id".to_string(),
                key_secret: "secret".to_string(),
                workspace_id: "ws".to_string(),
                api_key: "key".to_string(),
            },
            region: "A100-MT".to_string(),
            output,
        };
        ApiClient::connect_with(&config, Arc::new(RecordingSleeper::new())).unwrap()
    }

    fn profile() -> Profile {
        Profile {
            name: "default".to_string(),
            key_id: "id".to_string(),
            key_secret: "secret".to_string(),
            x_workspace_id: "ws".to_string(),
            x_api_key: "key".to_string(),
            region: Some("DGX2-MT".to_string()),
            output: Some("text".to_string()),
            endpoint_url: None,
        }
    }

    #[test]
    fn test_builder_uses_profile_then_defaults() {
        let config = ClientConfig::builder(Settings::default(), profile()).build();
        assert_eq!(config.region, "DGX2-MT");
        assert_eq!(config.output, OutputPreference::Text);
        assert_eq!(config.transport.endpoint_url, crate::settings::DEFAULT_ENDPOINT_URL);
        assert_eq!(config.transport.retry, RetryPolicy::new(3, 0.3));
        assert_eq!(config.credentials.workspace_id, "ws");
    }

    #[test]
    fn test_builder_flags_override_profile() {
        let config = ClientConfig::builder(Settings::default(), profile())
            .region(Some("A100-MT".to_string()))
            .output(Some(OutputPreference::Json))
            .endpoint_url(Some("http://localhost:8080".to_string()))
            .build();
        assert_eq!(config.region, "A100-MT");
        assert_eq!(config.output, OutputPreference::Json);
        assert_eq!(config.transport.endpoint_url, "http://localhost:8080");
    }

    #[test]
    fn test_builder_ignores_blank_flags() {
        let config = ClientConfig::builder(Settings::default(), profile())
            .region(Some(" ".to_string()))
            .build();
        assert_eq!(config.region, "DGX2-MT");
    }

    #[test]
    fn test_session_headers_on_every_call() {
        let mut server = mockito::Server::new();
        let client = connected(&mut server);
        let mock = server
            .mock("GET", "/jobs/abc")
            .match_header("authorization", "TOKEN")
            .match_header("x-workspace-id", "ws")
            .match_header("x-api-key", "key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "Running"}"#)
            .create();

        let result = client.call(&Request::get("jobs/abc")).unwrap();
        mock.assert();
        assert!(!result.is_error());
        assert_eq!(result.json().unwrap()["status"], "Running");
    }

    #[test]
    fn test_failed_exchange_aborts_construction() {
        let mut server = mockito::Server::new();
        let _auth = server
            .mock("POST", "/service_auth")
            .with_status(403)
            .with_body("forbidden")
            .create();
        let config = ClientConfig::builder(Settings::default(), profile())
            .endpoint_url(Some(server.url()))
            .build();

        let err = ApiClient::connect_with(&config, Arc::new(RecordingSleeper::new()))
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::Authorization(_)));
    }

    #[test]
    fn test_stream_through_client() {
        let mut server = mockito::Server::new();
        let client = connected(&mut server);
        let _logs = server
            .mock("GET", "/jobs/abc/logs")
            .match_query(mockito::Matcher::UrlEncoded("stream".into(), "true".into()))
            .with_status(200)
            .with_body("line 1\nline 2\n")
            .create();

        let text: String = client
            .stream(Request::get("jobs/abc/logs").query("stream", "true"))
            .collect::<Result<Vec<_>>>()
            .unwrap()
            .concat();
        assert_eq!(text, "line 1\nline 2\n");
    }
}
