//! SYSMSG Core - Listener registry, dispatch routing and attribute fan-out.
//!
//! Components register interest in message categories with a [`Registry`].
//! A single processing context asks the registry whether a message has a
//! handler ([`Registry::has_handler`]) and then delivers it
//! ([`Registry::deliver`]) to every matching listener in registration order.
//!
//! Attribute-changed messages are additionally decoded by a built-in fan-out
//! and handed to every [`AttrListener`] as a slice of [`AttrId`]s.
//!
//! The registry shares one re-entrant lock with the [`AttrTable`]; see the
//! [`lock`] module for the acquisition rules.

pub mod attr;
pub mod error;
pub mod fanout;
pub mod listener;
pub mod lock;
pub mod message;
pub mod registry;
pub mod stats;

pub use attr::{AttrChangeSink, AttrTable, AttrValue, SharedAttrTable};
pub use error::{Error, Result};
pub use fanout::ATTR_FANOUT_NAME;
pub use listener::{AttrCallback, AttrListener, CategoryCallback, CategoryListener, ListenerId};
pub use lock::{Guarded, LockToken, SharedLock};
pub use message::{AttrId, Message, MsgCode, Payload};
pub use registry::{DispatchStatus, Registry, SharedRegistry};
pub use stats::{DispatchStats, SharedDispatchStats, StatsSnapshot};
