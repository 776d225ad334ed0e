//! Broadcast Hub
//!
//! The central coordinator for chat sessions. All mutable membership state
//! lives inside a single actor task; the rest of the process talks to it
//! through a [`HubHandle`] by sending signals (join, leave, forward) over a
//! channel. Processing one signal at a time gives every membership change
//! and fan-out decision a strict total order without any locking.
//!
//! Each session hands the hub the sending half of its bounded outbound
//! queue. Fan-out uses a non-blocking `try_send`: a full queue means the
//! consumer is dead or stalled, and the session is evicted in the same
//! pass. The hub loop therefore never waits on a slow client.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::trace::Tracer;

/// Opaque message payload broadcast verbatim to every active session.
pub type Payload = Vec<u8>;

/// Unique identifier for a connected session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A session as registered with the hub: its identity plus the sending
/// half of its bounded outbound queue. The hub holds the only sender, so
/// removing a session from the active set drops the sender and closes the
/// queue exactly once.
pub struct Session {
    pub id: SessionId,
    pub outbound: mpsc::Sender<Payload>,
}

/// Configuration for the broadcast hub
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Capacity of each session's outbound queue. Once full, the session
    /// is evicted on the next fan-out rather than blocking the hub.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// Depth of the hub's own signal channel
    #[serde(default = "default_signal_capacity")]
    pub signal_capacity: usize,
}

fn default_outbound_capacity() -> usize {
    256
}

fn default_signal_capacity() -> usize {
    64
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
            signal_capacity: default_signal_capacity(),
        }
    }
}

/// Signals processed one at a time by the hub's control loop
enum Signal {
    Join(Session),
    Leave(SessionId),
    Forward(Payload),
    SessionCount(oneshot::Sender<usize>),
}

/// Errors that can occur when signalling the hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub is no longer running")]
    Closed,
}

/// Cloneable handle for signalling the hub from session tasks
#[derive(Clone)]
pub struct HubHandle {
    signals: mpsc::Sender<Signal>,
}

impl HubHandle {
    /// Register a session with the hub. Once processed, the session
    /// receives every subsequently broadcast message until it leaves.
    pub async fn join(&self, session: Session) -> Result<(), HubError> {
        self.signals
            .send(Signal::Join(session))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Remove a session from the active set and close its outbound queue.
    /// A no-op if the session is absent (already evicted, or never joined),
    /// so sessions can always report their own departure.
    pub async fn leave(&self, id: SessionId) -> Result<(), HubError> {
        self.signals
            .send(Signal::Leave(id))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Broadcast a payload to every session active at the moment of fan-out.
    pub async fn forward(&self, payload: Payload) -> Result<(), HubError> {
        self.signals
            .send(Signal::Forward(payload))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Number of sessions currently in the active set. Answered by the
    /// control loop itself, so the reply reflects every signal sent before
    /// this one.
    pub async fn session_count(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.signals
            .send(Signal::SessionCount(reply))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

/// The broadcast hub actor. Owns the active set; runs as a single task.
pub struct Hub {
    signals: mpsc::Receiver<Signal>,
    sessions: HashMap<SessionId, mpsc::Sender<Payload>>,
    tracer: Arc<dyn Tracer>,
}

impl Hub {
    /// Spawn the hub control loop, returning a handle for signalling it.
    /// The loop runs until every handle is dropped.
    pub fn spawn(config: HubConfig, tracer: Arc<dyn Tracer>) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.signal_capacity);
        let hub = Hub {
            signals: rx,
            sessions: HashMap::new(),
            tracer,
        };
        let task = tokio::spawn(hub.run());
        (HubHandle { signals: tx }, task)
    }

    async fn run(mut self) {
        while let Some(signal) = self.signals.recv().await {
            match signal {
                Signal::Join(session) => {
                    self.tracer
                        .trace(format_args!("session joined: {}", session.id));
                    self.sessions.insert(session.id, session.outbound);
                }
                Signal::Leave(id) => {
                    // Removal drops the hub's sender for this queue, which
                    // is what closes it; the map entry is gone before the
                    // drop, so no fan-out can write to a closing queue.
                    if self.sessions.remove(&id).is_some() {
                        self.tracer.trace(format_args!("session left: {}", id));
                    }
                }
                Signal::Forward(payload) => {
                    self.tracer.trace(format_args!(
                        "message received: {}",
                        String::from_utf8_lossy(&payload)
                    ));
                    self.fan_out(payload);
                }
                Signal::SessionCount(reply) => {
                    let _ = reply.send(self.sessions.len());
                }
            }
        }
    }

    /// Offer the payload to every active session in one pass. Sessions
    /// whose queue is full or already closed are dropped from the active
    /// set within the same pass.
    fn fan_out(&mut self, payload: Payload) {
        let tracer = &self.tracer;
        self.sessions
            .retain(|id, outbound| match outbound.try_send(payload.clone()) {
                Ok(()) => {
                    tracer.trace(format_args!("-- delivered to {}", id));
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracer.trace(format_args!("-- queue full, evicting {}", id));
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracer.trace(format_args!("-- queue closed, dropping {}", id));
                    false
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace;

    fn test_session(capacity: usize) -> (Session, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Session {
                id: SessionId::new(),
                outbound: tx,
            },
            rx,
        )
    }

    fn spawn_hub() -> (HubHandle, JoinHandle<()>) {
        Hub::spawn(HubConfig::default(), trace::off())
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.outbound_capacity, 256);
        assert_eq!(config.signal_capacity, 64);
    }

    #[tokio::test]
    async fn test_join_forward_leave() {
        let (hub, _task) = spawn_hub();
        let (a, mut rx_a) = test_session(8);
        let (b, mut rx_b) = test_session(8);
        let a_id = a.id;

        hub.join(a).await.unwrap();
        hub.join(b).await.unwrap();
        hub.forward(b"hi".to_vec()).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 2);

        assert_eq!(rx_a.try_recv().unwrap(), b"hi");
        assert_eq!(rx_b.try_recv().unwrap(), b"hi");

        hub.leave(a_id).await.unwrap();
        hub.forward(b"bye".to_vec()).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 1);

        // A's queue was closed by the leave; only B sees "bye".
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), b"bye");
    }

    #[tokio::test]
    async fn test_full_queue_evicts_session() {
        let (hub, _task) = spawn_hub();
        let (a, mut rx_a) = test_session(1);

        hub.join(a).await.unwrap();
        hub.forward(b"m1".to_vec()).await.unwrap();
        hub.forward(b"m2".to_vec()).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 0);

        // "m1" was queued before the eviction; "m2" never arrives and the
        // queue is closed behind it.
        assert_eq!(rx_a.try_recv().unwrap(), b"m1");
        assert!(matches!(
            rx_a.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_leave_unknown_session_is_noop() {
        let (hub, _task) = spawn_hub();
        let (a, _rx_a) = test_session(8);
        let a_id = a.id;

        hub.join(a).await.unwrap();
        hub.leave(SessionId::new()).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 1);

        // Leaving twice is also fine: the second removal finds nothing.
        hub.leave(a_id).await.unwrap();
        hub.leave(a_id).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_cleaned_up_on_forward() {
        let (hub, _task) = spawn_hub();
        let (a, rx_a) = test_session(8);

        hub.join(a).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 1);

        drop(rx_a);
        hub.forward(b"ping".to_vec()).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_per_session_message_order() {
        let (hub, _task) = spawn_hub();
        let (a, mut rx_a) = test_session(8);

        hub.join(a).await.unwrap();
        hub.forward(b"one".to_vec()).await.unwrap();
        hub.forward(b"two".to_vec()).await.unwrap();
        hub.forward(b"three".to_vec()).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 1);

        assert_eq!(rx_a.try_recv().unwrap(), b"one");
        assert_eq!(rx_a.try_recv().unwrap(), b"two");
        assert_eq!(rx_a.try_recv().unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_stopped_hub_reports_closed() {
        let (hub, task) = spawn_hub();
        task.abort();
        let _ = task.await;

        let (a, _rx_a) = test_session(8);
        assert!(matches!(hub.join(a).await, Err(HubError::Closed)));
        assert!(matches!(
            hub.forward(b"hi".to_vec()).await,
            Err(HubError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_late_joiner_misses_earlier_messages() {
        let (hub, _task) = spawn_hub();
        let (a, mut rx_a) = test_session(8);
        let (b, mut rx_b) = test_session(8);

        hub.join(a).await.unwrap();
        hub.forward(b"early".to_vec()).await.unwrap();
        hub.join(b).await.unwrap();
        hub.forward(b"late".to_vec()).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 2);

        assert_eq!(rx_a.try_recv().unwrap(), b"early");
        assert_eq!(rx_a.try_recv().unwrap(), b"late");
        assert_eq!(rx_b.try_recv().unwrap(), b"late");
        assert!(rx_b.try_recv().is_err());
    }
}
