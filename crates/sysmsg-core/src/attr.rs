//! Attribute table.
//!
//! A small in-process attribute store. It owns the [`SharedLock`] that the
//! registry reuses, and reports changed identifiers to an [`AttrChangeSink`]
//! while that lock is still held.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::lock::{Guarded, LockToken, SharedLock};
use crate::message::AttrId;

/// Attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean flag.
    Bool(bool),
    /// Unsigned integer.
    U32(u32),
    /// Signed integer.
    I64(i64),
    /// Free text.
    Text(String),
}

impl AttrValue {
    /// Parse a value the way the daemon's `set` command reads it:
    /// `true`/`false`, then `u32`, then `i64`, otherwise text.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(v) = raw.parse::<u32>() {
            Self::U32(v)
        } else if let Ok(v) = raw.parse::<i64>() {
            Self::I64(v)
        } else {
            Self::Text(raw.to_string())
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Receiver of attribute-changed notifications.
///
/// Called with the shared lock held. Implementations must not block waiting
/// on another thread that needs the same lock (for example on a full queue
/// drained by the processing thread).
pub trait AttrChangeSink: Send + Sync {
    /// `ids` changed value, in the order they were written.
    fn notify(&self, token: &LockToken<'_>, ids: Vec<AttrId>);
}

#[derive(Default)]
struct TableState {
    values: BTreeMap<AttrId, AttrValue>,
    sink: Option<Arc<dyn AttrChangeSink>>,
}

/// In-process attribute store.
pub struct AttrTable {
    lock: Arc<SharedLock>,
    state: Guarded<TableState>,
}

impl AttrTable {
    /// Create an empty table with its own shared lock.
    pub fn new() -> Self {
        let lock = Arc::new(SharedLock::new());
        Self {
            state: Guarded::new(Arc::clone(&lock), TableState::default()),
            lock,
        }
    }

    /// The lock guarding this table, to be shared with the registry.
    pub fn shared_lock(&self) -> &Arc<SharedLock> {
        &self.lock
    }

    /// Install the receiver of change notifications, replacing any previous one.
    pub fn set_sink(&self, sink: Arc<dyn AttrChangeSink>) {
        let token = self.lock.lock();
        self.state.with(&token, |state| state.sink = Some(sink));
    }

    /// Current value of `id`.
    pub fn get(&self, id: AttrId) -> Option<AttrValue> {
        let token = self.lock.lock();
        self.state.with(&token, |state| state.values.get(&id).cloned())
    }

    /// Write one attribute. Returns `true` if its value changed.
    pub fn set(&self, id: AttrId, value: impl Into<AttrValue>) -> bool {
        self.set_many([(id, value.into())]) > 0
    }

    /// Write several attributes as one change.
    ///
    /// Returns how many distinct attributes changed value. If any did, the
    /// sink receives their identifiers before the shared lock is released.
    pub fn set_many<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = (AttrId, AttrValue)>,
    {
        // Caller code must not run inside the leaf cell.
        let values: Vec<(AttrId, AttrValue)> = values.into_iter().collect();

        let token = self.lock.lock();
        let (changed, sink) = self.state.with(&token, |state| {
            let mut changed = Vec::new();
            for (id, value) in values {
                if state.values.get(&id) == Some(&value) {
                    continue;
                }
                state.values.insert(id, value);
                if !changed.contains(&id) {
                    changed.push(id);
                }
            }
            (changed, state.sink.clone())
        });

        let count = changed.len();
        if count > 0 {
            tracing::debug!(count, "attributes changed");
            match sink {
                Some(sink) => sink.notify(&token, changed),
                None => tracing::trace!("no attribute change sink installed"),
            }
        }
        count
    }

    /// Number of attributes holding a value.
    pub fn len(&self) -> usize {
        let token = self.lock.lock();
        self.state.with(&token, |state| state.values.len())
    }

    /// Whether no attribute holds a value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AttrTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AttrTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttrTable")
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

/// Shared attribute table handle.
pub type SharedAttrTable = Arc<AttrTable>;
