//! Peer set maintained by a group-membership protocol.
//!
//! The protocol (external to this crate) reports views: the full list of live
//! members with the URL each one advertises. Readers load an immutable
//! snapshot through `ArcSwap`, so `resolve()` never takes a lock and never
//! waits for the view to converge. Writers are serialized by a mutex around
//! the member table and publish a fresh snapshot on every change.

use super::{PeerAddress, PeerResolver};
use crate::config::PeerInfoStrategy;
use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A live member as reported by the membership protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub node_id: String,
    pub url: PeerAddress,
}

impl Member {
    pub fn new(node_id: impl Into<String>, url: PeerAddress) -> Self {
        Member {
            node_id: node_id.into(),
            url,
        }
    }
}

pub struct DynamicPeerResolver {
    cluster_name: String,
    my_url: Option<PeerAddress>,
    members: Mutex<BTreeMap<String, PeerAddress>>,
    view: ArcSwap<Vec<PeerAddress>>,
}

impl DynamicPeerResolver {
    pub fn new(cluster_name: impl Into<String>, my_url: Option<PeerAddress>) -> Self {
        DynamicPeerResolver {
            cluster_name: cluster_name.into(),
            my_url,
            members: Mutex::new(BTreeMap::new()),
            view: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Replace the whole view (what a membership protocol reports on change).
    pub fn set_view(&self, members: impl IntoIterator<Item = Member>) {
        let mut table = self.lock_members();
        table.clear();
        for member in members {
            table.insert(member.node_id, member.url);
        }
        self.publish(&table);
    }

    pub fn member_joined(&self, member: Member) {
        let mut table = self.lock_members();
        tracing::info!(
            "[PEERS {}] member {} joined at {}",
            self.cluster_name,
            member.node_id,
            member.url
        );
        table.insert(member.node_id, member.url);
        self.publish(&table);
    }

    pub fn member_left(&self, node_id: &str) {
        let mut table = self.lock_members();
        if table.remove(node_id).is_some() {
            tracing::info!("[PEERS {}] member {} left", self.cluster_name, node_id);
            self.publish(&table);
        }
    }

    /// Snapshot of the current peers (self excluded).
    pub fn peers(&self) -> Arc<Vec<PeerAddress>> {
        self.view.load_full()
    }

    /// Follow a view channel fed by the membership protocol until its sender
    /// is dropped.
    pub fn subscribe(self: Arc<Self>, mut views: watch::Receiver<Vec<Member>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let initial = views.borrow_and_update().clone();
            self.set_view(initial);
            while views.changed().await.is_ok() {
                let next = views.borrow_and_update().clone();
                self.set_view(next);
            }
            tracing::info!(
                "[PEERS {}] membership channel closed, keeping last view",
                self.cluster_name
            );
        })
    }

    fn lock_members(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, PeerAddress>> {
        // The table is rebuilt from scratch by every view, so a poisoned lock
        // holds nothing worth discarding.
        self.members.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, table: &BTreeMap<String, PeerAddress>) {
        let mut peers: Vec<PeerAddress> = table
            .values()
            .filter(|url| Some(*url) != self.my_url.as_ref())
            .cloned()
            .collect();
        peers.sort();
        peers.dedup();

        if peers.len() > 1 {
            tracing::warn!(
                "[PEERS {}] view has {} peers; forwarding to {} only",
                self.cluster_name,
                peers.len(),
                peers[0]
            );
        }
        tracing::debug!("[PEERS {}] view updated: {:?}", self.cluster_name, peers);
        self.view.store(Arc::new(peers));
    }
}

impl PeerResolver for DynamicPeerResolver {
    fn resolve(&self) -> Option<PeerAddress> {
        self.view.load().first().cloned()
    }

    fn strategy(&self) -> PeerInfoStrategy {
        PeerInfoStrategy::Dynamic
    }
}
