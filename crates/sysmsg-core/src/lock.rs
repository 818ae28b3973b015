//! The shared critical section.
//!
//! One [`SharedLock`] is owned by the attribute subsystem and handed to the
//! registry, so that "attribute producer changes a value → dispatch → fan-out
//! → attribute listener reads a value" is a single critical section instead of
//! two locks that can be taken in opposite orders by the producer and the
//! processing thread.
//!
//! Two acquisition paths are supported and both are exercised:
//!
//! - **Re-entrancy**: the lock is a [`parking_lot::ReentrantMutex`], so the
//!   thread that holds it may lock it again. The attribute fan-out does this
//!   when called from the delivery loop, and so does any listener that reads
//!   the attribute table.
//! - **Token passing**: code that already holds the lock passes its
//!   [`LockToken`] down (for example [`Registry::deliver_locked`]) and nothing
//!   is re-acquired.
//!
//! Data guarded by the shared lock lives in [`Guarded`] cells. A cell can only
//! be opened with a token for the lock it was created with, and the closure
//! that receives the data must not call out to listeners.
//!
//! [`Registry::deliver_locked`]: crate::Registry::deliver_locked

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

/// Re-entrant lock shared between the attribute subsystem and the registry.
pub struct SharedLock {
    mutex: ReentrantMutex<()>,
}

impl SharedLock {
    /// Create a new, unlocked shared lock.
    pub fn new() -> Self {
        Self {
            mutex: ReentrantMutex::new(()),
        }
    }

    /// Acquire the lock, blocking until it is available.
    ///
    /// Succeeds immediately if the current thread already holds it.
    pub fn lock(&self) -> LockToken<'_> {
        LockToken {
            owner: self,
            _guard: self.mutex.lock(),
        }
    }

    /// Whether any thread currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }
}

impl Default for SharedLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Proof that the current thread holds a [`SharedLock`].
///
/// Released when dropped. Not `Send`: a token cannot leave the thread that
/// acquired it.
pub struct LockToken<'a> {
    owner: &'a SharedLock,
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl LockToken<'_> {
    /// Whether this token was issued by `lock`.
    pub fn guards(&self, lock: &SharedLock) -> bool {
        std::ptr::eq(self.owner, lock)
    }
}

impl fmt::Debug for LockToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockToken").finish_non_exhaustive()
    }
}

/// A value that may only be touched while the shared lock is held.
///
/// The inner mutex is a leaf: it is only taken by a thread that already holds
/// the shared lock and is released before [`Guarded::with`] returns, so it is
/// never contended and never held across a listener callback.
pub struct Guarded<T> {
    lock: Arc<SharedLock>,
    cell: Mutex<T>,
}

impl<T> Guarded<T> {
    /// Wrap `value` under `lock`.
    pub fn new(lock: Arc<SharedLock>, value: T) -> Self {
        Self {
            lock,
            cell: Mutex::new(value),
        }
    }

    /// The lock that guards this value.
    pub fn lock(&self) -> &Arc<SharedLock> {
        &self.lock
    }

    /// Run `f` on the guarded value.
    ///
    /// # Panics
    ///
    /// Panics if `token` was issued by a different [`SharedLock`].
    pub fn with<R>(&self, token: &LockToken<'_>, f: impl FnOnce(&mut T) -> R) -> R {
        assert!(
            token.guards(&self.lock),
            "guarded value opened with a token for a different lock"
        );
        let mut value = self.cell.lock();
        f(&mut value)
    }
}

impl<T> fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded").finish_non_exhaustive()
    }
}
