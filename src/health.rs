use crate::config::HealthCheckConfig;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether this node should receive traffic, as seen by the peer's routing
/// layer.
///
/// With health checking disabled the node always reports healthy and
/// [`set_healthy`](Self::set_healthy) has no effect.
#[derive(Debug)]
pub struct HealthSignal {
    enabled: bool,
    healthy: AtomicBool,
}

impl HealthSignal {
    pub fn new(config: &HealthCheckConfig) -> Self {
        HealthSignal {
            enabled: config.enable,
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_healthy(&self) -> bool {
        !self.enabled || self.healthy.load(Ordering::Acquire)
    }

    pub fn set_healthy(&self, healthy: bool) {
        if !self.enabled {
            tracing::debug!("[REPL health] health check disabled, ignoring update");
            return;
        }
        let previous = self.healthy.swap(healthy, Ordering::AcqRel);
        if previous != healthy {
            tracing::info!(
                "[REPL health] node marked {}",
                if healthy { "ready" } else { "unavailable" }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settable_when_enabled() {
        let signal = HealthSignal::new(&HealthCheckConfig { enable: true });
        assert!(signal.is_healthy());
        signal.set_healthy(false);
        assert!(!signal.is_healthy());
        signal.set_healthy(true);
        assert!(signal.is_healthy());
    }

    #[test]
    fn test_disabled_always_healthy() {
        let signal = HealthSignal::new(&HealthCheckConfig { enable: false });
        signal.set_healthy(false);
        assert!(signal.is_healthy());
        assert!(!signal.is_enabled());
    }
}
