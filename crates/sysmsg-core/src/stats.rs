//! Dispatch counters.
//!
//! Collected by the registry and the attribute fan-out, read by the processing
//! context and the daemon's `stats` command.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

/// Counters for delivery activity.
#[derive(Debug)]
pub struct DispatchStats {
    started_at: Instant,

    // Category delivery
    delivered: AtomicU64,
    unrouted: AtomicU64,
    listener_invocations: AtomicU64,
    listener_panics: AtomicU64,

    // Attribute fan-out
    attr_fanouts: AtomicU64,
    attr_invocations: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Seconds since the counters were created.
    pub uptime_secs: u64,
    /// Messages handed to at least one listener.
    pub delivered: u64,
    /// Messages no listener was interested in.
    pub unrouted: u64,
    /// Category listener callbacks invoked.
    pub listener_invocations: u64,
    /// Callbacks (either kind) that panicked.
    pub listener_panics: u64,
    /// Attribute-changed events fanned out.
    pub attr_fanouts: u64,
    /// Attribute listener callbacks invoked.
    pub attr_invocations: u64,
}

impl DispatchStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            delivered: AtomicU64::new(0),
            unrouted: AtomicU64::new(0),
            listener_invocations: AtomicU64::new(0),
            listener_panics: AtomicU64::new(0),
            attr_fanouts: AtomicU64::new(0),
            attr_invocations: AtomicU64::new(0),
        }
    }

    /// Record a message that reached `listeners` category listeners.
    pub fn record_delivered(&self, listeners: usize) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.listener_invocations
            .fetch_add(listeners as u64, Ordering::Relaxed);
    }

    /// Record a message nobody was interested in.
    pub fn record_unrouted(&self) {
        self.unrouted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a listener callback that panicked.
    pub fn record_panic(&self) {
        self.listener_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one attribute fan-out reaching `listeners` attribute listeners.
    pub fn record_attr_fanout(&self, listeners: usize) {
        self.attr_fanouts.fetch_add(1, Ordering::Relaxed);
        self.attr_invocations
            .fetch_add(listeners as u64, Ordering::Relaxed);
    }

    // Getters

    /// Messages handed to at least one listener.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Messages no listener was interested in.
    pub fn unrouted(&self) -> u64 {
        self.unrouted.load(Ordering::Relaxed)
    }

    /// Callbacks that panicked.
    pub fn listener_panics(&self) -> u64 {
        self.listener_panics.load(Ordering::Relaxed)
    }

    /// Attribute-changed events fanned out.
    pub fn attr_fanouts(&self) -> u64 {
        self.attr_fanouts.load(Ordering::Relaxed)
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            delivered: self.delivered(),
            unrouted: self.unrouted(),
            listener_invocations: self.listener_invocations.load(Ordering::Relaxed),
            listener_panics: self.listener_panics(),
            attr_fanouts: self.attr_fanouts(),
            attr_invocations: self.attr_invocations.load(Ordering::Relaxed),
        }
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared counters handle.
pub type SharedDispatchStats = Arc<DispatchStats>;
