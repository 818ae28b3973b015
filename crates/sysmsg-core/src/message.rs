//! Message categories and payloads.
//!
//! The core treats every category except [`MsgCode::ATTR_CHANGED`] as an opaque
//! key. [`MsgCode::INVALID`] is the explicit sentinel that never routes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message category key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgCode(u32);

impl MsgCode {
    /// Sentinel category; never has a handler.
    pub const INVALID: MsgCode = MsgCode(0);

    /// One or more attributes changed value.
    pub const ATTR_CHANGED: MsgCode = MsgCode(1);

    /// Create a category key from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value of the category key.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether this is anything other than [`MsgCode::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl From<u32> for MsgCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MsgCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::INVALID => f.write_str("INVALID"),
            Self::ATTR_CHANGED => f.write_str("ATTR_CHANGED"),
            Self(raw) => write!(f, "{:#06x}", raw),
        }
    }
}

/// Attribute identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrId(u16);

impl AttrId {
    /// Create an attribute identifier from its raw value.
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw value of the identifier.
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u16> for AttrId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    /// No body.
    #[default]
    Empty,
    /// Opaque bytes, interpreted only by listeners.
    Bytes(Vec<u8>),
    /// Identifiers of the attributes that changed, in the order they changed.
    AttrChanged(Vec<AttrId>),
}

/// A message travelling from a producer to the processing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Category used for routing.
    pub code: MsgCode,
    /// Message body.
    pub payload: Payload,
}

impl Message {
    /// Create a message with an empty payload.
    pub fn new(code: impl Into<MsgCode>) -> Self {
        Self {
            code: code.into(),
            payload: Payload::Empty,
        }
    }

    /// Create a message carrying opaque bytes.
    pub fn with_bytes(code: impl Into<MsgCode>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            code: code.into(),
            payload: Payload::Bytes(bytes.into()),
        }
    }

    /// Create an attribute-changed notification.
    pub fn attr_changed(ids: impl Into<Vec<AttrId>>) -> Self {
        Self {
            code: MsgCode::ATTR_CHANGED,
            payload: Payload::AttrChanged(ids.into()),
        }
    }

    /// Changed identifiers, if this message carries them.
    pub fn attr_ids(&self) -> Option<&[AttrId]> {
        match &self.payload {
            Payload::AttrChanged(ids) => Some(ids),
            _ => None,
        }
    }

    /// Opaque bytes, if this message carries them.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}
