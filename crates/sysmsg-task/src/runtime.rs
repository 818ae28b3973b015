//! Composition root: attribute table, registry and processing context wired
//! together, plus the line commands the daemon accepts on stdin.

use std::str::FromStr;
use std::sync::Arc;

use sysmsg_core::{AttrId, AttrTable, AttrValue, Message, MsgCode, Registry, SharedAttrTable, SharedRegistry};

use crate::config::{parse_code, AttrDelivery, TaskConfig};
use crate::error::{Error, Result};
use crate::processor::{MessageSender, ProcessingTask};

/// A daemon shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `set <id> <value>`
    Set { id: AttrId, value: AttrValue },
    /// `get <id>`
    Get { id: AttrId },
    /// `send <code> [hex-bytes]`
    Send { code: MsgCode, bytes: Option<Vec<u8>> },
    /// `stats`
    Stats,
    /// `help`
    Help,
    /// `quit`
    Quit,
}

/// Usage text printed by `help`.
pub const HELP: &str = "\
commands:
  set <id> <value>        write an attribute (true/false, integer or text)
  get <id>                read an attribute
  send <code> [hex]       queue a message, optionally with a hex payload
  stats                   print dispatch counters as JSON
  help                    show this text
  quit                    stop the daemon";

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err(Error::Command("empty command".to_string()));
        };

        let command = match verb {
            "set" => {
                let id = parse_attr_id(parts.next())?;
                let rest: Vec<&str> = parts.by_ref().collect();
                if rest.is_empty() {
                    return Err(Error::Command("set: missing value".to_string()));
                }
                Command::Set {
                    id,
                    value: AttrValue::parse(&rest.join(" ")),
                }
            }
            "get" => Command::Get {
                id: parse_attr_id(parts.next())?,
            },
            "send" => {
                let code = parts
                    .next()
                    .ok_or_else(|| Error::Command("send: missing code".to_string()))
                    .and_then(|raw| parse_code(raw).map_err(Error::Command))?;
                let bytes = parts
                    .next()
                    .map(|raw| hex::decode(raw).map_err(|e| Error::Command(format!("send: bad payload: {}", e))))
                    .transpose()?;
                Command::Send {
                    code: MsgCode::new(code),
                    bytes,
                }
            }
            "stats" => Command::Stats,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(Error::Command(format!("unknown command {:?}", other))),
        };

        if parts.next().is_some() {
            return Err(Error::Command(format!("{}: too many arguments", verb)));
        }
        Ok(command)
    }
}

fn parse_attr_id(raw: Option<&str>) -> Result<AttrId> {
    let raw = raw.ok_or_else(|| Error::Command("missing attribute id".to_string()))?;
    raw.parse::<u16>()
        .map(AttrId::new)
        .map_err(|e| Error::Command(format!("invalid attribute id {:?}: {}", raw, e)))
}

/// Outcome of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text to print.
    Text(String),
    /// Stop the daemon.
    Quit,
}

/// A running table → registry → processing context stack.
pub struct Runtime {
    table: SharedAttrTable,
    registry: SharedRegistry,
    sender: MessageSender,
    task: ProcessingTask,
}

impl Runtime {
    /// Build and start everything.
    ///
    /// The registry is initialized before the processing thread starts and
    /// before the attribute table can emit its first notification.
    pub fn start(config: &TaskConfig) -> Result<Self> {
        let table = Arc::new(AttrTable::new());
        let registry = Arc::new(Registry::new(Arc::clone(table.shared_lock())));
        registry.init();

        let (task, sender) = ProcessingTask::start(config, Arc::clone(&registry))?;

        match config.attr_delivery {
            AttrDelivery::Queued => table.set_sink(Arc::new(sender.clone())),
            AttrDelivery::Sync => table.set_sink(registry.clone()),
        }
        tracing::debug!(mode = ?config.attr_delivery, "attribute change sink installed");

        Ok(Self {
            table,
            registry,
            sender,
            task,
        })
    }

    /// The attribute table.
    pub fn table(&self) -> &SharedAttrTable {
        &self.table
    }

    /// The listener registry.
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// A sender for the processing queue.
    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    /// Execute one command.
    pub fn execute(&self, command: Command) -> Result<Reply> {
        let text = match command {
            Command::Set { id, value } => {
                if self.table.set(id, value) {
                    format!("attr {} changed", id)
                } else {
                    format!("attr {} unchanged", id)
                }
            }
            Command::Get { id } => match self.table.get(id) {
                Some(value) => format!("attr {} = {}", id, value),
                None => format!("attr {} unset", id),
            },
            Command::Send { code, bytes } => {
                let msg = match bytes {
                    Some(bytes) => Message::with_bytes(code, bytes),
                    None => Message::new(code),
                };
                self.sender.try_send(msg)?;
                format!("queued {}", code)
            }
            Command::Stats => serde_json::to_string(&self.registry.stats().snapshot())
                .map_err(|e| Error::Command(format!("stats: {}", e)))?,
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Text(text))
    }

    /// Drain the queue and stop the processing thread.
    pub fn shutdown(self) {
        self.task.stop();
        tracing::info!(stats = ?self.registry.stats().snapshot(), "runtime stopped");
    }
}
