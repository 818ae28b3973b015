//! Listener registry, dispatch router and delivery loop.
//!
//! ## Layout
//!
//! ```text
//! Registry
//!   ├─ categories: Guarded<Arc<Vec<CategoryEntry>>>   [attr-fanout, L1, L2, ...]
//!   └─ attrs:      Guarded<Arc<Vec<AttrEntry>>>       [A1, A2, ...]
//!                      ▲
//!                      └── both opened only under the SharedLock
//! ```
//!
//! Both sequences are copy-on-write. A delivery clones the `Arc` of the
//! sequence it walks, so a registration made while callbacks run (from another
//! thread once the lock is released, or from a callback on the same thread)
//! never disturbs the walk in progress and is seen by the next delivery.
//!
//! ## Initialization
//!
//! [`Registry::new`] builds a registry that rejects registrations with
//! [`Error::NotReady`]. [`Registry::init`] registers the attribute fan-out
//! first, then marks the registry ready, so the fan-out always precedes every
//! external listener of the attribute-changed category.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::attr::AttrChangeSink;
use crate::error::{Error, Result};
use crate::fanout::{AttrFanout, AttrSeq};
use crate::listener::{AttrListener, CategoryEntry, CategoryListener, ListenerId};
use crate::lock::{Guarded, LockToken, SharedLock};
use crate::message::{AttrId, Message, MsgCode};
use crate::stats::{DispatchStats, SharedDispatchStats};

type CategorySeq = Arc<Vec<Arc<CategoryEntry>>>;

/// Outcome of delivering one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// At least one listener was invoked.
    Routed {
        /// Number of listeners invoked.
        listeners: usize,
    },
    /// No listener matched the message category.
    Unrouted,
}

impl DispatchStatus {
    /// Whether any listener was invoked.
    pub fn is_routed(&self) -> bool {
        matches!(self, Self::Routed { .. })
    }
}

/// Registry of category listeners and attribute listeners.
pub struct Registry {
    lock: Arc<SharedLock>,
    categories: Guarded<CategorySeq>,
    attrs: Arc<Guarded<AttrSeq>>,
    ready: AtomicBool,
    next_listener_id: AtomicU64,
    stats: SharedDispatchStats,
}

impl Registry {
    /// Create an uninitialized registry guarded by `lock`.
    ///
    /// `lock` is normally the attribute subsystem's lock, see
    /// [`AttrTable::shared_lock`](crate::AttrTable::shared_lock).
    pub fn new(lock: Arc<SharedLock>) -> Self {
        Self {
            categories: Guarded::new(Arc::clone(&lock), Arc::new(Vec::new())),
            attrs: Arc::new(Guarded::new(Arc::clone(&lock), Arc::new(Vec::new()))),
            lock,
            ready: AtomicBool::new(false),
            next_listener_id: AtomicU64::new(1),
            stats: Arc::new(DispatchStats::new()),
        }
    }

    /// Register the attribute fan-out and accept external registrations.
    ///
    /// Calling this more than once has no further effect.
    pub fn init(&self) {
        let token = self.lock.lock();
        if self.is_ready() {
            tracing::debug!("registry already initialized");
            return;
        }

        let fanout = AttrFanout::new(Arc::clone(&self.attrs), Arc::clone(&self.stats));
        match self.append_category(&token, fanout.into_listener()) {
            Ok(id) => tracing::debug!(listener_id = id.get(), "registered attribute fan-out"),
            Err(e) => tracing::error!(error = %e, "failed to register attribute fan-out"),
        }

        self.ready.store(true, Ordering::Release);
        drop(token);
        tracing::debug!("registry ready");
    }

    /// Whether [`Registry::init`] has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// The lock guarding both listener sequences.
    pub fn shared_lock(&self) -> &Arc<SharedLock> {
        &self.lock
    }

    /// Delivery counters.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Register interest in one or more message categories.
    ///
    /// No duplicate check is made: registering an equivalent record twice
    /// yields two listeners that are both invoked.
    pub fn register_category_listener(&self, listener: CategoryListener) -> Result<ListenerId> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        let token = self.lock.lock();
        self.append_category(&token, listener)
    }

    /// Register interest in every attribute-changed event.
    pub fn register_attr_listener(&self, listener: AttrListener) -> Result<ListenerId> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }

        // Ids are allocated under the lock so they follow traversal order.
        let token = self.lock.lock();
        let entry = listener
            .into_entry(self.allocate_id())
            .inspect_err(|e| tracing::error!(error = %e, "rejected attribute listener"))?;
        let id = entry.id;
        let name = entry.name.clone();

        self.attrs
            .with(&token, |seq| Arc::make_mut(seq).push(Arc::new(entry)));
        drop(token);

        tracing::debug!(listener_id = id.get(), listener = ?name, "attribute listener registered");
        Ok(id)
    }

    fn append_category(&self, token: &LockToken<'_>, listener: CategoryListener) -> Result<ListenerId> {
        let entry = listener
            .into_entry(self.allocate_id())
            .inspect_err(|e| tracing::error!(error = %e, "rejected category listener"))?;
        let id = entry.id;

        tracing::debug!(
            listener_id = id.get(),
            listener = ?entry.name,
            "category listener registered"
        );
        self.categories
            .with(token, |seq| Arc::make_mut(seq).push(Arc::new(entry)));
        Ok(id)
    }

    fn allocate_id(&self) -> ListenerId {
        ListenerId::new(self.next_listener_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of registered category listeners, including the attribute fan-out.
    pub fn category_listener_count(&self) -> usize {
        let token = self.lock.lock();
        self.categories.with(&token, |seq| seq.len())
    }

    /// Number of registered attribute listeners.
    pub fn attr_listener_count(&self) -> usize {
        let token = self.lock.lock();
        self.attrs.with(&token, |seq| seq.len())
    }

    /// Whether at least one category listener matches `code`.
    ///
    /// Always `false` before initialization and for [`MsgCode::INVALID`].
    /// Lets the processing context skip delivery for categories nobody
    /// listens to.
    pub fn has_handler(&self, code: MsgCode) -> bool {
        if !self.is_ready() || !code.is_valid() {
            return false;
        }

        let token = self.lock.lock();
        self.categories
            .with(&token, |seq| seq.iter().any(|entry| entry.matches(code)))
    }

    /// Invoke every category listener that matches `msg.code`, in
    /// registration order.
    ///
    /// The shared lock is held for the whole pass, callbacks included.
    pub fn deliver(&self, msg: &Message) -> DispatchStatus {
        let token = self.lock.lock();
        self.deliver_locked(&token, msg)
    }

    /// [`Registry::deliver`] for a caller that already holds the shared lock.
    ///
    /// # Panics
    ///
    /// Panics if `token` was not issued by this registry's lock.
    pub fn deliver_locked(&self, token: &LockToken<'_>, msg: &Message) -> DispatchStatus {
        let listeners = self.categories.with(token, |seq| Arc::clone(seq));

        let mut invoked = 0;
        for entry in listeners.iter() {
            // A listener fires at most once per message, whatever its category set.
            if !entry.matches(msg.code) {
                continue;
            }
            if !entry.invoke(msg) {
                self.stats.record_panic();
            }
            invoked += 1;
        }

        if invoked == 0 {
            self.stats.record_unrouted();
            tracing::trace!(code = %msg.code, "message unrouted");
            DispatchStatus::Unrouted
        } else {
            self.stats.record_delivered(invoked);
            tracing::trace!(code = %msg.code, listeners = invoked, "message delivered");
            DispatchStatus::Routed { listeners: invoked }
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("ready", &self.is_ready())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Synchronous notification path: the attribute producer still holds the
/// shared lock, so delivery reuses its token instead of re-locking.
impl AttrChangeSink for Registry {
    fn notify(&self, token: &LockToken<'_>, ids: Vec<AttrId>) {
        if !token.guards(&self.lock) {
            tracing::error!(
                count = ids.len(),
                "attribute change sink wired to a table with a different lock, dropped"
            );
            return;
        }
        if !self.is_ready() {
            tracing::debug!(count = ids.len(), "attribute change before registry init, dropped");
            return;
        }
        self.deliver_locked(token, &Message::attr_changed(ids));
    }
}

/// Shared registry handle.
pub type SharedRegistry = Arc<Registry>;
