//! Attribute fan-out.
//!
//! A built-in category listener for [`MsgCode::ATTR_CHANGED`]. Rather than
//! every interested component registering for the raw message and decoding it,
//! the fan-out decodes the changed-identifier list once and hands the slice to
//! each attribute listener.

use std::sync::Arc;

use crate::listener::{AttrEntry, CategoryListener};
use crate::lock::Guarded;
use crate::message::{Message, MsgCode};
use crate::stats::SharedDispatchStats;

/// Registered attribute listeners, in registration order.
pub(crate) type AttrSeq = Arc<Vec<Arc<AttrEntry>>>;

/// Name under which the fan-out appears in logs.
pub const ATTR_FANOUT_NAME: &str = "attr-fanout";

pub(crate) struct AttrFanout {
    listeners: Arc<Guarded<AttrSeq>>,
    stats: SharedDispatchStats,
}

impl AttrFanout {
    pub(crate) fn new(listeners: Arc<Guarded<AttrSeq>>, stats: SharedDispatchStats) -> Self {
        Self { listeners, stats }
    }

    /// The category listener record that drives this fan-out.
    pub(crate) fn into_listener(self) -> CategoryListener {
        CategoryListener::named(ATTR_FANOUT_NAME)
            .with_category(MsgCode::ATTR_CHANGED)
            .with_callback(move |msg| self.on_message(msg))
    }

    fn on_message(&self, msg: &Message) {
        let Some(ids) = msg.attr_ids() else {
            tracing::warn!(
                code = %msg.code,
                "attribute-changed message without an identifier list"
            );
            return;
        };

        // Already held by the delivery loop that called us; this nests.
        let token = self.listeners.lock().lock();
        let listeners = self.listeners.with(&token, |seq| Arc::clone(seq));

        for entry in listeners.iter() {
            if !entry.invoke(ids) {
                self.stats.record_panic();
            }
        }
        self.stats.record_attr_fanout(listeners.len());

        tracing::trace!(
            count = ids.len(),
            listeners = listeners.len(),
            "attribute change fanned out"
        );
    }
}
