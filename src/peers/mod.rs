//! Peer address resolution.
//!
//! A [`PeerResolver`] answers "where do forwards go right now?". `None` means
//! no peer is known (dynamic membership has not discovered anybody yet, or the
//! static list is empty). That is a distinct state from a known peer that does
//! not answer, which surfaces later as a transport failure.

pub mod membership;
pub mod static_peers;

use crate::config::{NodeConfig, PeerInfoStrategy};
use crate::error::{HaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use membership::{DynamicPeerResolver, Member};
pub use static_peers::StaticPeerResolver;

/// Canonical base URL of a peer: http(s), no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress {
    url: String,
}

impl PeerAddress {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(HaError::InvalidPeerUrl {
                url: raw.to_string(),
                reason: "empty".to_string(),
            });
        }

        let parsed = url::Url::parse(trimmed).map_err(|e| HaError::InvalidPeerUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(HaError::InvalidPeerUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(HaError::InvalidPeerUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(PeerAddress {
            url: trimmed.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `{base}{path}`; `path` must start with `/`.
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = HaError;

    fn try_from(value: String) -> Result<Self> {
        PeerAddress::parse(&value)
    }
}

impl From<PeerAddress> for String {
    fn from(value: PeerAddress) -> Self {
        value.url
    }
}

pub trait PeerResolver: Send + Sync {
    /// The current forwarding target, or `None` when no peer is known.
    /// Never blocks on membership convergence.
    fn resolve(&self) -> Option<PeerAddress>;

    fn strategy(&self) -> PeerInfoStrategy;
}

/// Resolver for the strategy configured in `config.peer_info`.
///
/// For the dynamic strategy the concrete resolver is returned as well so the
/// membership protocol can feed it view changes.
pub fn resolver_from_config(
    config: &NodeConfig,
) -> Result<(Arc<dyn PeerResolver>, Option<Arc<DynamicPeerResolver>>)> {
    match config.peer_info.strategy {
        PeerInfoStrategy::Static => {
            let resolver = StaticPeerResolver::from_urls(&config.peer_info.static_urls)?;
            Ok((Arc::new(resolver), None))
        }
        PeerInfoStrategy::Dynamic => {
            let my_url = config
                .peer_info
                .dynamic
                .my_url
                .as_deref()
                .map(PeerAddress::parse)
                .transpose()?;
            let resolver = Arc::new(DynamicPeerResolver::new(
                config.peer_info.dynamic.cluster_name.clone(),
                my_url,
            ));
            Ok((resolver.clone() as Arc<dyn PeerResolver>, Some(resolver)))
        }
    }
}
