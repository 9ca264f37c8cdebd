//! Outbound HTTP delivery of replication events to a peer.

use crate::config::HttpConfig;
use crate::error::{HaError, Result};
use crate::event::{IndexOperation, ReplicationEvent};
use crate::peers::PeerAddress;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use std::fmt;
use std::time::Duration;

/// Path prefix of every forwarded-operation endpoint.
pub const REPLICATION_BASE_PATH: &str = "/internal/replication";

/// The one status a peer answers with when it applied a forwarded operation.
pub const SUCCESS_STATUS: StatusCode = StatusCode::NO_CONTENT;

/// Result of delivering one event to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingOutcome {
    Success,
    /// The peer answered but rejected or failed the operation. Never retried.
    ApplicationError { status: u16, message: String },
    /// No usable answer after the whole retry budget.
    TransportFailure { cause: String },
    /// No peer is currently known; nothing was sent.
    PeerUnavailable,
}

impl ForwardingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ForwardingOutcome::Success)
    }
}

impl fmt::Display for ForwardingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardingOutcome::Success => f.write_str("success"),
            ForwardingOutcome::ApplicationError { status, message } => {
                write!(f, "rejected with status {}: {}", status, message)
            }
            ForwardingOutcome::TransportFailure { cause } => {
                write!(f, "transport failure: {}", cause)
            }
            ForwardingOutcome::PeerUnavailable => f.write_str("no peer available"),
        }
    }
}

#[async_trait]
pub trait ReplicationTransport: Send + Sync {
    /// Deliver `event` to `peer`, retrying transport failures per policy.
    async fn send(&self, peer: &PeerAddress, event: &ReplicationEvent) -> ForwardingOutcome;
}

/// Method, path (relative to the peer base URL) and JSON body for an event.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Vec<u8>>,
}

impl WireRequest {
    pub fn for_event(event: &ReplicationEvent) -> Result<Self> {
        let enc = |s: &str| urlencoding::encode(s).into_owned();
        match event {
            ReplicationEvent::CacheEvict { cache_name, key } => Ok(WireRequest {
                method: Method::POST,
                path: format!("{}/cache/{}", REPLICATION_BASE_PATH, enc(cache_name)),
                body: Some(serde_json::to_vec(key)?),
            }),
            ReplicationEvent::DomainEvent(domain) => Ok(WireRequest {
                method: Method::POST,
                path: format!("{}/event/{}", REPLICATION_BASE_PATH, enc(&domain.event_type)),
                body: Some(serde_json::to_vec(domain)?),
            }),
            ReplicationEvent::IndexMutation {
                entity_kind,
                entity_id,
                operation,
                meta,
            } => {
                let method = match operation {
                    IndexOperation::Index => Method::POST,
                    IndexOperation::Delete => Method::DELETE,
                };
                let body = meta.as_ref().map(serde_json::to_vec).transpose()?;
                Ok(WireRequest {
                    method,
                    path: format!(
                        "{}/index/{}/{}",
                        REPLICATION_BASE_PATH,
                        enc(entity_kind),
                        enc(entity_id)
                    ),
                    body,
                })
            }
        }
    }
}

/// reqwest-backed transport with a fixed-interval retry policy.
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Option<(String, String)>,
    max_tries: u32,
    retry_interval: Duration,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connection_timeout())
            .timeout(config.socket_timeout())
            // A 3xx is the final answer of the peer.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HaError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = if config.has_credentials() {
            Some((config.user.clone(), config.password.clone()))
        } else {
            None
        };

        Ok(HttpTransport {
            client,
            credentials,
            max_tries: config.max_tries.max(1),
            retry_interval: config.retry_interval(),
        })
    }

    /// One request. `Ok` carries a terminal outcome, `Err` a retryable cause.
    async fn attempt(
        &self,
        url: &str,
        request: &WireRequest,
    ) -> std::result::Result<ForwardingOutcome, String> {
        let mut builder = self.client.request(request.method.clone(), url);
        if let Some((user, password)) = &self.credentials {
            builder = builder.basic_auth(user, Some(password));
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if status == SUCCESS_STATUS {
            return Ok(ForwardingOutcome::Success);
        }

        // A body we cannot read in full is a broken exchange, not an answer.
        let message = response.text().await.map_err(|e| e.to_string())?;
        Ok(ForwardingOutcome::ApplicationError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ReplicationTransport for HttpTransport {
    async fn send(&self, peer: &PeerAddress, event: &ReplicationEvent) -> ForwardingOutcome {
        let request = match WireRequest::for_event(event) {
            Ok(r) => r,
            Err(e) => {
                return ForwardingOutcome::TransportFailure {
                    cause: format!("cannot serialize {}: {}", event, e),
                }
            }
        };
        let url = peer.join(&request.path);

        let mut last_cause = String::new();
        for attempt in 1..=self.max_tries {
            match self.attempt(&url, &request).await {
                Ok(outcome) => return outcome,
                Err(cause) => {
                    tracing::debug!(
                        "[REPL] attempt {}/{} to {} failed: {}",
                        attempt,
                        self.max_tries,
                        url,
                        cause
                    );
                    last_cause = cause;
                }
            }
            if attempt < self.max_tries {
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        ForwardingOutcome::TransportFailure {
            cause: format!("{} after {} attempts", last_cause, self.max_tries),
        }
    }
}
