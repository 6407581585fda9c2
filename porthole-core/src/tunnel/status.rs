//! Runtime status shared between the control loop, proxy sessions and
//! status readers. Every field is an independent atomic.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub struct TunnelStatus {
    connected: AtomicBool,
    active_proxies: AtomicUsize,
    /// Milliseconds since the epoch; 0 until the first heartbeat
    last_heartbeat_ms: AtomicU64,
}

/// Point-in-time copy of [`TunnelStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub active_proxies: usize,
    pub last_heartbeat: Option<SystemTime>,
}

impl TunnelStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
        #[cfg(feature = "metrics")]
        if let Some(metrics) = porthole_observability::tunnel_metrics() {
            metrics.set_connected(connected);
        }
    }

    pub fn active_proxies(&self) -> usize {
        self.active_proxies.load(Ordering::Acquire)
    }

    /// Count one running proxy session until the returned guard drops.
    pub(crate) fn track_proxy(self: &Arc<Self>) -> ProxyGuard {
        self.active_proxies.fetch_add(1, Ordering::AcqRel);
        #[cfg(feature = "metrics")]
        if let Some(metrics) = porthole_observability::tunnel_metrics() {
            metrics.proxy_started();
        }
        ProxyGuard {
            status: Arc::clone(self),
            failed: false,
        }
    }

    pub(crate) fn record_heartbeat(&self) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        // Keep 0 reserved for "never"
        self.last_heartbeat_ms
            .store(now_ms.max(1), Ordering::Release);
        #[cfg(feature = "metrics")]
        if let Some(metrics) = porthole_observability::tunnel_metrics() {
            metrics.heartbeat();
        }
    }

    pub fn last_heartbeat(&self) -> Option<SystemTime> {
        match self.last_heartbeat_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(UNIX_EPOCH + Duration::from_millis(ms)),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            connected: self.connected(),
            active_proxies: self.active_proxies(),
            last_heartbeat: self.last_heartbeat(),
        }
    }
}

/// Decrements the active proxy count exactly once, on drop
#[derive(Debug)]
pub(crate) struct ProxyGuard {
    status: Arc<TunnelStatus>,
    failed: bool,
}

impl ProxyGuard {
    pub(crate) fn mark_failed(&mut self) {
        self.failed = true;
    }
}

impl Drop for ProxyGuard {
    fn drop(&mut self) {
        self.status.active_proxies.fetch_sub(1, Ordering::AcqRel);
        #[cfg(feature = "metrics")]
        if let Some(metrics) = porthole_observability::tunnel_metrics() {
            metrics.proxy_finished(self.failed);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = self.failed;
    }
}
