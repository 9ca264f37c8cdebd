//! # hasync
//!
//! Active/active forwarding core for a pair of nodes that serve the same data.
//!
//! Each node keeps its own caches and indexes. Whenever one of them changes
//! locally (an explicit cache invalidation, a project-scoped domain event, an
//! index update), the change is forwarded to the peer over HTTP so both nodes
//! converge. Operations received from the peer are applied locally inside a
//! [`ForwardingContext`] scope, which keeps them from being forwarded back.
//!
//! ## Outbound
//!
//! Dispatchers ([`dispatch`]) filter local mutation signals and queue them on
//! bounded worker pools. Workers call the [`Forwarder`], which resolves the
//! peer through a [`PeerResolver`] and hands the event to a
//! [`ReplicationTransport`]. Failures are logged and dropped.
//!
//! ## Inbound
//!
//! [`IndexReceiver`](receiver::IndexReceiver) applies forwarded index
//! mutations under a stripe lock; cache evictions and events have their own
//! receivers. The `hasync-http` crate exposes them as endpoints.
//!
//! ```rust,no_run
//! use hasync::{Collaborators, NodeConfig, ReplicationManager};
//! use std::path::Path;
//!
//! # async fn run() -> hasync::Result<()> {
//! let config = NodeConfig::load_or_default(Path::new("./data"));
//! let manager = ReplicationManager::new(config, Collaborators::new())?;
//! println!("forwarding to {:?}", manager.status().peer);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod forwarder;
pub mod health;
pub mod manager;
pub mod pattern;
pub mod peers;
pub mod receiver;
pub mod transport;

pub use config::NodeConfig;
pub use context::ForwardingContext;
pub use dispatch::DispatchOutcome;
pub use error::{HaError, Result};
pub use event::{CacheRemoval, DomainEvent, IndexMeta, IndexOperation, ReplicationEvent};
pub use forwarder::Forwarder;
pub use health::HealthSignal;
pub use manager::{Collaborators, ReplicationManager, ReplicationStatus};
pub use peers::{PeerAddress, PeerResolver};
pub use transport::{ForwardingOutcome, HttpTransport, ReplicationTransport};
