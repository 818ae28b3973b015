//! Processing context configuration.

use clap::{Parser, ValueEnum};

use crate::error::{Error, Result};

/// Default number of queued messages.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Default processing thread name.
pub const DEFAULT_THREAD_NAME: &str = "smt";

/// How attribute changes reach attribute listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AttrDelivery {
    /// Post an attribute-changed message to the queue; listeners run on the
    /// processing thread.
    #[default]
    Queued,
    /// Deliver on the writer's thread before the write returns, reusing the
    /// lock the writer holds.
    Sync,
}

/// Processing context configuration.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Capacity of the bounded message queue.
    pub queue_capacity: usize,

    /// Name given to the processing thread.
    pub thread_name: String,

    /// Attribute change delivery mode.
    pub attr_delivery: AttrDelivery,
}

impl TaskConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            attr_delivery: AttrDelivery::default(),
        }
    }

    /// Set the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the processing thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the attribute change delivery mode.
    pub fn with_attr_delivery(mut self, mode: AttrDelivery) -> Self {
        self.attr_delivery = mode;
        self
    }

    /// Check the configuration before starting a processing context.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be at least 1".to_string()));
        }
        if self.thread_name.is_empty() {
            return Err(Error::Config("thread name must not be empty".to_string()));
        }
        if self.thread_name.contains('\0') {
            return Err(Error::Config("thread name must not contain NUL".to_string()));
        }
        Ok(())
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for the daemon.
#[derive(Parser, Debug)]
#[command(name = "sysmsgd")]
#[command(version, about = "SYSMSG message dispatch daemon", long_about = None)]
pub struct Args {
    /// Capacity of the message queue.
    #[arg(short, long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Name of the processing thread.
    #[arg(long, default_value = DEFAULT_THREAD_NAME)]
    pub thread_name: String,

    /// Attribute change delivery mode.
    #[arg(long, value_enum, default_value_t = AttrDelivery::Queued)]
    pub attr_delivery: AttrDelivery,

    /// Message categories to log on delivery (decimal or 0x-prefixed hex).
    #[arg(short, long = "watch", value_parser = parse_code)]
    pub watch: Vec<u32>,
}

impl Args {
    /// Convert command-line arguments to a processing context configuration.
    pub fn into_config(self) -> TaskConfig {
        TaskConfig {
            queue_capacity: self.queue_capacity,
            thread_name: self.thread_name,
            attr_delivery: self.attr_delivery,
        }
    }
}

/// Parse a category code written in decimal or `0x` hex.
pub fn parse_code(raw: &str) -> std::result::Result<u32, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid message code {:?}: {}", raw, e))
}
