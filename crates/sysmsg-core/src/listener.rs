//! Listener records.
//!
//! A listener is built by the component that is interested in messages and
//! moved into the [`Registry`](crate::Registry) exactly once. The registry keeps
//! it for its whole lifetime; there is no way to unregister.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::message::{AttrId, Message, MsgCode};

/// Callback invoked for every message whose category the listener matches.
pub type CategoryCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Callback invoked with the identifiers of every attribute-changed event.
pub type AttrCallback = Arc<dyn Fn(&[AttrId]) + Send + Sync>;

/// Registry-assigned listener identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interest in one or more message categories.
#[derive(Clone, Default)]
pub struct CategoryListener {
    name: Option<String>,
    categories: Vec<MsgCode>,
    callback: Option<CategoryCallback>,
}

impl CategoryListener {
    /// Create an empty listener record.
    ///
    /// A category and a callback must be added before registration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty listener record with a name used in logs.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Add one category.
    pub fn with_category(mut self, code: impl Into<MsgCode>) -> Self {
        self.categories.push(code.into());
        self
    }

    /// Add several categories, keeping their order.
    pub fn with_categories<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<MsgCode>,
    {
        self.categories.extend(codes.into_iter().map(Into::into));
        self
    }

    /// Set the callback.
    pub fn with_callback(mut self, callback: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Name used in logs, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Categories this listener matches, in registration order.
    pub fn categories(&self) -> &[MsgCode] {
        &self.categories
    }

    pub(crate) fn into_entry(self, id: ListenerId) -> Result<CategoryEntry> {
        let Some(callback) = self.callback else {
            return Err(Error::InvalidArgument(
                "category listener has no callback".to_string(),
            ));
        };
        if self.categories.is_empty() {
            return Err(Error::InvalidArgument(
                "category listener has no categories".to_string(),
            ));
        }
        if self.categories.contains(&MsgCode::INVALID) {
            return Err(Error::InvalidArgument(
                "category listener matches the INVALID category".to_string(),
            ));
        }

        Ok(CategoryEntry {
            id,
            name: self.name,
            categories: self.categories.into_boxed_slice(),
            callback,
        })
    }
}

impl fmt::Debug for CategoryListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryListener")
            .field("name", &self.name)
            .field("categories", &self.categories)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Interest in every attribute-changed event.
#[derive(Clone, Default)]
pub struct AttrListener {
    name: Option<String>,
    callback: Option<AttrCallback>,
}

impl AttrListener {
    /// Create an empty listener record; a callback must be set before registration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty listener record with a name used in logs.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            callback: None,
        }
    }

    /// Set the callback.
    pub fn with_callback(mut self, callback: impl Fn(&[AttrId]) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Name used in logs, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn into_entry(self, id: ListenerId) -> Result<AttrEntry> {
        let Some(callback) = self.callback else {
            return Err(Error::InvalidArgument(
                "attribute listener has no callback".to_string(),
            ));
        };

        Ok(AttrEntry {
            id,
            name: self.name,
            callback,
        })
    }
}

impl fmt::Debug for AttrListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttrListener")
            .field("name", &self.name)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// A validated, registered category listener.
pub(crate) struct CategoryEntry {
    pub(crate) id: ListenerId,
    pub(crate) name: Option<String>,
    categories: Box<[MsgCode]>,
    callback: CategoryCallback,
}

impl CategoryEntry {
    /// Linear scan of the category set.
    pub(crate) fn matches(&self, code: MsgCode) -> bool {
        self.categories.iter().any(|&c| c == code)
    }

    /// Invoke the callback, containing any panic. Returns `false` if it panicked.
    pub(crate) fn invoke(&self, msg: &Message) -> bool {
        invoke_isolated("category", self.id, self.name.as_deref(), || {
            (self.callback)(msg)
        })
    }
}

/// A validated, registered attribute listener.
pub(crate) struct AttrEntry {
    pub(crate) id: ListenerId,
    pub(crate) name: Option<String>,
    callback: AttrCallback,
}

impl AttrEntry {
    /// Invoke the callback, containing any panic. Returns `false` if it panicked.
    pub(crate) fn invoke(&self, ids: &[AttrId]) -> bool {
        invoke_isolated("attribute", self.id, self.name.as_deref(), || {
            (self.callback)(ids)
        })
    }
}

/// Run one listener callback so that a panic cannot unwind into the
/// delivery loop and skip the listeners after it.
fn invoke_isolated(kind: &'static str, id: ListenerId, name: Option<&str>, f: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                kind,
                listener_id = id.get(),
                listener = name.unwrap_or("<unnamed>"),
                panic = %panic_message(payload.as_ref()),
                "listener panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
