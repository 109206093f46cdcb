use std::time::Duration;

/// Cadence of outgoing pings while a channel is open.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// Silence after which the peer is declared gone. Over three ping periods,
/// so one or two lost heartbeats are never fatal.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tracks when the peer was last heard from. This is the sole source of
/// truth for liveness; the explicit `left` notice is only a courtesy.
///
/// Recovery is automatic: stamping any received message makes the peer
/// live again, no reset needed.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    last_seen_ms: u64,
}

impl HeartbeatMonitor {
    pub fn new(now_ms: u64) -> Self {
        Self { last_seen_ms: now_ms }
    }

    /// Stamp receipt of any peer message, heartbeat or not.
    pub fn observe(&mut self, now_ms: u64) {
        self.last_seen_ms = now_ms;
    }

    /// True once the silence exceeds the timeout.
    pub fn is_overdue(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_seen_ms) > HEARTBEAT_TIMEOUT.as_millis() as u64
    }
}
