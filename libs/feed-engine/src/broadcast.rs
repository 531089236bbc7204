use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use feed_api::{OverflowPolicy, TransactionRecord, TransportKind, UpdateMessage};

pub type ConnectionId = u64;

// ═══════════════════════════════════════════════════════════════
//  Frames and sinks
// ═══════════════════════════════════════════════════════════════

/// Unit written to a client transport. The payload is serialized once
/// per publish and shared between all connections.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(Arc<str>),
    /// Inert frame keeping idle proxies from timing the connection out.
    KeepAlive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("client queue full")]
    Full,
    #[error("client transport closed")]
    Closed,
}

/// Write side of one client transport.
///
/// `deliver` must not block and must not call back into the
/// broadcaster: it runs while the connection set is locked.
pub trait ConnectionSink: Send + Sync {
    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError>;
}

/// Sink backed by a bounded mpsc queue; the transport task owns the
/// receiver and writes frames to the socket / response body.
pub struct ChannelSink {
    tx: mpsc::Sender<Frame>,
}

impl ChannelSink {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl ConnectionSink for ChannelSink {
    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        self.tx.try_send(frame.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Broadcaster
// ═══════════════════════════════════════════════════════════════

struct Connection {
    id: ConnectionId,
    kind: TransportKind,
    sink: Box<dyn ConnectionSink>,
}

/// Outcome of one fan-out pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Frames skipped for slow clients under `OverflowPolicy::Drop`.
    pub dropped: usize,
    /// Connections removed because their transport was dead.
    pub removed: usize,
}

/// Owns the set of live client connections and pushes frames to them.
///
/// Failure of one connection never affects the others: a dead
/// connection is removed, a full one is handled per overflow policy.
pub struct Broadcaster {
    connections: Mutex<Vec<Connection>>,
    next_id: AtomicU64,
    overflow: OverflowPolicy,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(OverflowPolicy::Drop)
    }
}

impl Broadcaster {
    pub fn new(overflow: OverflowPolicy) -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            overflow,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, kind: TransportKind, sink: impl ConnectionSink + 'static) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push(Connection { id, kind, sink: Box::new(sink) });
        tracing::debug!(connection = id, transport = %kind, "connection open");
        id
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let mut conns = self.lock();
        match conns.iter().position(|c| c.id == id) {
            Some(i) => {
                let conn = conns.swap_remove(i);
                tracing::debug!(connection = id, transport = %conn.kind, "connection closed");
                true
            }
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    /// Register a channel-backed connection and return its guard and
    /// the frame receiver the transport task drains.
    pub fn attach(
        self: &Arc<Self>,
        kind: TransportKind,
        buffer: usize,
    ) -> (Registration, mpsc::Receiver<Frame>) {
        let (sink, rx) = ChannelSink::channel(buffer);
        let id = self.register(kind, sink);
        (
            Registration {
                id,
                broadcaster: Arc::clone(self),
            },
            rx,
        )
    }

    /// Push a `new-transactions` envelope carrying `records` to every
    /// connection. Serializes once.
    pub fn publish(&self, records: &[TransactionRecord]) -> Result<PublishReport, serde_json::Error> {
        let msg = UpdateMessage::NewTransactions {
            transactions: records.to_vec(),
        };
        let payload: Arc<str> = msg.to_json()?.into();
        Ok(self.fan_out(&Frame::Message(payload)))
    }

    pub fn keep_alive(&self) -> PublishReport {
        self.fan_out(&Frame::KeepAlive)
    }

    fn fan_out(&self, frame: &Frame) -> PublishReport {
        let mut report = PublishReport::default();
        let mut conns = self.lock();
        let mut i = 0;
        while i < conns.len() {
            let conn = &conns[i];
            match conn.sink.deliver(frame) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Full) if self.overflow == OverflowPolicy::Drop => {
                    tracing::warn!(connection = conn.id, transport = %conn.kind, "client queue full, dropping frame");
                    report.dropped += 1;
                }
                Err(e) => {
                    tracing::debug!(connection = conn.id, transport = %conn.kind, error = %e, "removing connection");
                    conns.swap_remove(i);
                    report.removed += 1;
                    continue;
                }
            }
            i += 1;
        }
        report
    }
}

// ═══════════════════════════════════════════════════════════════
//  Registration guard
// ═══════════════════════════════════════════════════════════════

/// Unregisters its connection when dropped, so every exit path of a
/// transport task releases the registration.
pub struct Registration {
    id: ConnectionId,
    broadcaster: Arc<Broadcaster>,
}

impl Registration {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.id);
    }
}

// ═══════════════════════════════════════════════════════════════
//  Keep-alive
// ═══════════════════════════════════════════════════════════════

pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// Send a keep-alive frame to every connection at a fixed interval
/// until `shutdown` is cancelled.
pub fn spawn_keepalive(
    broadcaster: Arc<Broadcaster>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = broadcaster.keep_alive();
                    if report.removed > 0 {
                        tracing::debug!(removed = report.removed, "keep-alive pruned connections");
                    }
                }
            }
        }
        tracing::debug!("keep-alive task stopped");
    })
}
