use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
//  Backoff
// ═══════════════════════════════════════════════════════════════

/// Delay policy between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed { delay: Duration },
    /// `initial * 2^attempt`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Backoff::Fixed { delay }
    }

    /// Delay before reconnect attempt number `attempt` (0-based).
    /// Non-decreasing in `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Reconnector
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Explicit reconnect state machine:
/// `Disconnected → Connecting → Connected → Disconnected ...`.
/// The attempt counter grows on every failure and resets once a
/// connection is established.
#[derive(Debug, Clone)]
pub struct Reconnector {
    backoff: Backoff,
    state: ConnectionState,
    attempt: u32,
}

impl Reconnector {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            state: ConnectionState::Disconnected,
            attempt: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failures since the last successful connection.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempt = 0;
    }

    /// Record a drop or failed attempt; returns how long to wait before
    /// the next one.
    pub fn disconnected(&mut self) -> Duration {
        self.state = ConnectionState::Disconnected;
        let delay = self.backoff.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }
}
