//! Loop-prevention flag for the current unit of execution.
//!
//! While a forwarded operation is being applied locally, every cache
//! invalidation, index update or event it triggers on this node must stay on
//! this node. Dispatchers consult [`ForwardingContext::is_forwarded`] before
//! queueing anything for the peer.
//!
//! The flag is a Tokio task-local, entered through a scope rather than set and
//! cleared by hand: it is `true` only while the scoped future (or closure) runs
//! and is restored on every exit path, including errors and panics. Concurrent
//! tasks never observe each other's flag.

use std::future::Future;

tokio::task_local! {
    static FORWARDED: bool;
}

pub struct ForwardingContext;

impl ForwardingContext {
    /// `true` when called from inside [`scope`](Self::scope) or
    /// [`sync_scope`](Self::sync_scope). Outside any scope (including plain
    /// threads with no Tokio task) this is `false`.
    pub fn is_forwarded() -> bool {
        FORWARDED.try_with(|forwarded| *forwarded).unwrap_or(false)
    }

    /// Run `fut` with the forwarded flag set.
    pub async fn scope<F>(fut: F) -> F::Output
    where
        F: Future,
    {
        FORWARDED.scope(true, fut).await
    }

    /// Synchronous counterpart of [`scope`](Self::scope), for collaborators
    /// whose apply path is blocking code.
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        FORWARDED.sync_scope(true, f)
    }

    /// Run `fut` explicitly outside any forwarded scope, e.g. for work spawned
    /// from a receiver that originates new local mutations of its own.
    pub async fn local<F>(fut: F) -> F::Output
    where
        F: Future,
    {
        FORWARDED.scope(false, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flag_only_inside_scope() {
        assert!(!ForwardingContext::is_forwarded());
        let inside = ForwardingContext::scope(async { ForwardingContext::is_forwarded() }).await;
        assert!(inside);
        assert!(!ForwardingContext::is_forwarded());
    }

    #[tokio::test]
    async fn test_flag_reset_after_error() {
        let result: Result<(), String> = ForwardingContext::scope(async {
            assert!(ForwardingContext::is_forwarded());
            Err("someMessage".to_string())
        })
        .await;
        assert_eq!(result.unwrap_err(), "someMessage");
        assert!(!ForwardingContext::is_forwarded());
    }

    #[test]
    fn test_sync_scope_reset_after_panic() {
        let caught = std::panic::catch_unwind(|| {
            ForwardingContext::sync_scope(|| {
                assert!(ForwardingContext::is_forwarded());
                panic!("indexer blew up");
            })
        });
        assert!(caught.is_err());
        assert!(!ForwardingContext::is_forwarded());
    }

    #[tokio::test]
    async fn test_local_overrides_forwarded() {
        let nested = ForwardingContext::scope(async {
            ForwardingContext::local(async { ForwardingContext::is_forwarded() }).await
        })
        .await;
        assert!(!nested);
    }

    #[tokio::test]
    async fn test_not_shared_between_tasks() {
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let forwarded_task = tokio::spawn(ForwardingContext::scope(async move {
            let _ = entered_tx.send(());
            let _ = release_rx.await;
            ForwardingContext::is_forwarded()
        }));

        entered_rx.await.unwrap();
        let other = tokio::spawn(async { ForwardingContext::is_forwarded() })
            .await
            .unwrap();
        assert!(!other);

        release_tx.send(()).unwrap();
        assert!(forwarded_task.await.unwrap());
    }
}
