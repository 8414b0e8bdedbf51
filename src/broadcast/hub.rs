//! Fan-out of server messages to every attached observer
//!
//! The loop is the only sender. Observers hold a broadcast receiver plus a
//! view of the latest full snapshot, so a (re)connecting client can be
//! brought up to date without asking the loop for anything.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::warn;

use crate::broadcast::protocol::ServerMessage;
use crate::broadcast::snapshot::WorldSnapshot;

/// Inbound control signals routed to the loop
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SetSpeed(f32),
    Reset,
}

struct HubInner {
    frames: broadcast::Sender<Arc<str>>,
    latest_init: watch::Sender<Option<Arc<str>>>,
    observers: Arc<AtomicUsize>,
    control: mpsc::Sender<ControlCommand>,
}

#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    /// Create a hub and the receiving end of the control channel
    pub fn new(capacity: usize, control_capacity: usize) -> (Self, mpsc::Receiver<ControlCommand>) {
        let (frames, _) = broadcast::channel(capacity.max(1));
        let (latest_init, _) = watch::channel(None);
        let (control, control_rx) = mpsc::channel(control_capacity.max(1));
        let hub = Self {
            inner: Arc::new(HubInner {
                frames,
                latest_init,
                observers: Arc::new(AtomicUsize::new(0)),
                control,
            }),
        };
        (hub, control_rx)
    }

    /// Serialize once and fan out. Returns the number of observers reached.
    pub fn send(&self, msg: &ServerMessage) -> usize {
        let frame: Arc<str> = match msg.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(kind = msg.kind(), error = %e, "failed to encode frame");
                return 0;
            }
        };
        // No receivers is not an error; the frame is simply dropped
        self.inner.frames.send(frame).unwrap_or(0)
    }

    /// Remember the snapshot handed to future connections, without broadcasting
    pub fn store_snapshot(&self, snapshot: WorldSnapshot) {
        match ServerMessage::WorldInit(snapshot).to_json() {
            Ok(json) => {
                self.inner.latest_init.send_replace(Some(json.into()));
            }
            Err(e) => warn!(error = %e, "failed to encode world:init"),
        }
    }

    /// Store the snapshot and send it as `world:init` to everyone attached
    pub fn publish_snapshot(&self, snapshot: WorldSnapshot) -> usize {
        self.store_snapshot(snapshot);
        let frame = self.inner.latest_init.borrow().clone();
        match frame {
            Some(frame) => self.inner.frames.send(frame).unwrap_or(0),
            None => 0,
        }
    }

    /// Send a `world:update` and keep the same state for (re)connects
    pub fn publish_update(&self, snapshot: WorldSnapshot) -> usize {
        let sent = self.send(&ServerMessage::WorldUpdate(snapshot.clone()));
        self.store_snapshot(snapshot);
        sent
    }

    /// Latest `world:init` frame, if the loop has produced one
    pub fn latest_init(&self) -> Option<Arc<str>> {
        self.inner.latest_init.borrow().clone()
    }

    /// Attach a new observer
    pub fn subscribe(&self) -> Observer {
        self.inner.observers.fetch_add(1, Ordering::Relaxed);
        Observer {
            frames: self.inner.frames.subscribe(),
            init: self.inner.latest_init.subscribe(),
            observers: self.inner.observers.clone(),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.load(Ordering::Relaxed)
    }

    /// Sender used by connection tasks to reach the loop
    pub fn control(&self) -> mpsc::Sender<ControlCommand> {
        self.inner.control.clone()
    }
}

/// One attached observer. Dropping it detaches.
pub struct Observer {
    frames: broadcast::Receiver<Arc<str>>,
    init: watch::Receiver<Option<Arc<str>>>,
    observers: Arc<AtomicUsize>,
}

impl Observer {
    /// Full snapshot to send first on connect
    pub fn initial_frame(&mut self) -> Option<Arc<str>> {
        self.init.borrow_and_update().clone()
    }

    /// Wait for the next frame. A lagging observer skips ahead to the
    /// newest frames; None means the hub is gone.
    pub async fn next_frame(&mut self) -> Option<Arc<str>> {
        loop {
            match self.frames.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "observer lagging, skipping frames");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.observers.fetch_sub(1, Ordering::Relaxed);
    }
}
