//! SYSMSG Task - Processing context for the dispatch registry.
//!
//! [`ProcessingTask`] owns the single consumer thread that drains a bounded
//! queue and hands each message to the [`sysmsg_core::Registry`].
//! [`Runtime`] wires an attribute table, a registry and a processing context
//! together, and is what the `sysmsgd` daemon runs.

pub mod config;
pub mod error;
pub mod processor;
pub mod runtime;

pub use config::{parse_code, Args, AttrDelivery, TaskConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_THREAD_NAME};
pub use error::{Error, Result};
pub use processor::{process_message, MessageSender, ProcessingTask};
pub use runtime::{Command, Reply, Runtime, HELP};
