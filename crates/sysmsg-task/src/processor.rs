//! The processing context.
//!
//! One dedicated thread drains a bounded queue and drives the registry:
//! for each message, ask the router whether anybody listens, and if so run
//! the delivery loop. Producers on any thread post through cloned
//! [`MessageSender`]s.
//!
//! The thread runs until [`ProcessingTask::stop`] is called. Messages queued
//! before the stop request are still delivered.

use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use sysmsg_core::{AttrChangeSink, AttrId, DispatchStatus, LockToken, Message, Registry, SharedRegistry};

use crate::config::TaskConfig;
use crate::error::{Error, Result};

enum Envelope {
    Message(Message),
    Stop,
}

/// Cloneable handle for posting messages to the processing context.
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<Envelope>,
}

impl MessageSender {
    /// Queue `msg` without waiting.
    ///
    /// Fails with [`Error::QueueFull`] when the queue has no free slot.
    pub fn try_send(&self, msg: Message) -> Result<()> {
        self.tx
            .try_send(Envelope::Message(msg))
            .map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull,
                TrySendError::Closed(_) => Error::Closed,
            })
    }

    /// Queue `msg`, waiting for a free slot.
    ///
    /// Must not be called from within an async runtime, nor while holding the
    /// shared lock (the processing thread may need it to make room).
    pub fn send(&self, msg: Message) -> Result<()> {
        self.tx
            .blocking_send(Envelope::Message(msg))
            .map_err(|_| Error::Closed)
    }

    /// Number of free queue slots right now.
    pub fn free_slots(&self) -> usize {
        self.tx.capacity()
    }

    /// Whether the processing thread has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSender")
            .field("free_slots", &self.free_slots())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Queued notification path: attribute changes are posted as messages and
/// fanned out later on the processing thread.
///
/// The writer holds the shared lock here, and the processing thread needs it
/// to drain the queue, so a full queue drops the notification rather than
/// waiting.
impl AttrChangeSink for MessageSender {
    fn notify(&self, _token: &LockToken<'_>, ids: Vec<AttrId>) {
        let count = ids.len();
        if let Err(e) = self.try_send(Message::attr_changed(ids)) {
            tracing::warn!(count, error = %e, "dropped attribute change notification");
        }
    }
}

/// Handle to the processing thread.
pub struct ProcessingTask {
    thread_name: String,
    stop_tx: mpsc::Sender<Envelope>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessingTask {
    /// Spawn the processing thread.
    ///
    /// `registry` should already be initialized; messages that arrive while it
    /// is not are reported as unrouted.
    pub fn start(config: &TaskConfig, registry: SharedRegistry) -> Result<(Self, MessageSender)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || Self::run_loop(rx, registry))?;

        tracing::info!(
            thread = %config.thread_name,
            queue_capacity = config.queue_capacity,
            "processing context started"
        );

        let task = Self {
            thread_name: config.thread_name.clone(),
            stop_tx: tx.clone(),
            handle: Mutex::new(Some(handle)),
        };
        Ok((task, MessageSender { tx }))
    }

    /// Name of the processing thread.
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Check if the processing thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Deliver everything already queued, then stop the thread and wait for it.
    ///
    /// Waits for a queue slot if the queue is full. Later sends fail with
    /// [`Error::Closed`]. Calling this again has no effect.
    pub fn stop(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };

        if self.stop_tx.blocking_send(Envelope::Stop).is_err() {
            tracing::debug!("processing thread already gone");
        }
        if handle.join().is_err() {
            tracing::error!(thread = %self.thread_name, "processing thread panicked");
        }
    }

    fn run_loop(mut rx: mpsc::Receiver<Envelope>, registry: SharedRegistry) {
        while let Some(envelope) = rx.blocking_recv() {
            match envelope {
                Envelope::Message(msg) => {
                    process_message(&registry, &msg);
                }
                Envelope::Stop => {
                    rx.close();
                    tracing::debug!("stop requested, draining queue");
                }
            }
        }

        tracing::info!(
            delivered = registry.stats().delivered(),
            unrouted = registry.stats().unrouted(),
            "processing context stopped"
        );
    }
}

impl std::fmt::Debug for ProcessingTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingTask")
            .field("thread_name", &self.thread_name)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Route and deliver one message, as the processing thread does.
pub fn process_message(registry: &Registry, msg: &Message) -> DispatchStatus {
    if !registry.has_handler(msg.code) {
        if msg.code.is_valid() {
            tracing::trace!(code = %msg.code, "no listener for message");
        } else {
            tracing::warn!(payload = ?msg.payload, "unknown message received");
        }
        registry.stats().record_unrouted();
        return DispatchStatus::Unrouted;
    }

    registry.deliver(msg)
}
