use super::{PeerAddress, PeerResolver};
use crate::config::PeerInfoStrategy;
use crate::error::Result;
use std::collections::BTreeSet;

/// Peers fixed at startup.
///
/// With more than one URL configured the lowest one (by canonical URL) is the
/// forwarding target, so every call resolves to the same peer.
#[derive(Debug, Clone)]
pub struct StaticPeerResolver {
    peers: BTreeSet<PeerAddress>,
}

impl StaticPeerResolver {
    pub fn new(peers: impl IntoIterator<Item = PeerAddress>) -> Self {
        let peers: BTreeSet<PeerAddress> = peers.into_iter().collect();
        if peers.len() > 1 {
            tracing::warn!(
                "[PEERS] {} static peers configured; forwarding to {} only",
                peers.len(),
                peers.iter().next().map(|p| p.url()).unwrap_or_default()
            );
        }
        StaticPeerResolver { peers }
    }

    pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> Result<Self> {
        let peers = urls
            .iter()
            .map(|u| PeerAddress::parse(u.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(peers))
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerAddress> {
        self.peers.iter()
    }
}

impl PeerResolver for StaticPeerResolver {
    fn resolve(&self) -> Option<PeerAddress> {
        self.peers.iter().next().cloned()
    }

    fn strategy(&self) -> PeerInfoStrategy {
        PeerInfoStrategy::Static
    }
}
