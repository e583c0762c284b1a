//! Control protocol shared by observer and server.
//!
//! Observers open a TCP connection to the command port and write one JSON `Command`
//! per line; the server answers every command with exactly one JSON `Reply` line.
//! Observer-scoped commands carry the UDP port the observer listens on, the server
//! combines it with the peer IP of the TCP connection to address the observer.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PulseError;
use crate::event::HealthUpdate;
use crate::model::DataSource;

/// Command sent from observer to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Start receiving broadcast events on `port`.
    Subscribe {
        /// UDP port the observer listens on.
        port: u16,
    },
    /// Stop receiving events and leave every group.
    Unsubscribe {
        /// UDP port given at subscribe time.
        port: u16,
    },
    /// Join the group of one data source.
    Join {
        /// UDP port given at subscribe time.
        port: u16,
        /// Source whose group is joined.
        #[serde(rename = "sourceId")]
        source_id: Uuid,
    },
    /// Leave the group of one data source.
    Leave {
        /// UDP port given at subscribe time.
        port: u16,
        /// Source whose group is left.
        #[serde(rename = "sourceId")]
        source_id: Uuid,
    },
    /// List the active data sources.
    ListSources,
    /// Run a health check now and return the current snapshot.
    CheckHealth,
}

/// Server answer to a `Command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    /// The observer is attached.
    Subscribed {
        /// Identity assigned by the server; stable while the observer stays attached.
        #[serde(rename = "observerId")]
        observer_id: u64,
    },
    /// The command succeeded and carries no data.
    Ack,
    /// Answer to `ListSources`.
    Sources {
        /// Active sources only.
        sources: Vec<DataSource>,
    },
    /// Answer to `CheckHealth`.
    Health {
        /// Latest entry per component.
        components: Vec<HealthUpdate>,
    },
    /// The command was malformed or rejected.
    Error {
        /// Why it failed.
        message: String,
    },
}

impl Command {
    /// Encode as a single newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String, PulseError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl Reply {
    /// Encode as a single newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String, PulseError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Wrap any displayable failure into an `Error` reply.
    pub fn error(err: impl ToString) -> Self {
        Reply::Error {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_command_wire_shape() {
        let id = Uuid::nil();
        let line = Command::Join { port: 5555, source_id: id }.to_line().unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["command"], "join");
        assert_eq!(value["port"], 5555);
        assert_eq!(value["sourceId"], id.to_string());
    }

    #[test]
    fn unit_commands_parse() {
        let cmd: Command = serde_json::from_str(r#"{"command":"check_health"}"#).unwrap();
        assert_eq!(cmd, Command::CheckHealth);
        let cmd: Command = serde_json::from_str(r#"{"command":"list_sources"}"#).unwrap();
        assert_eq!(cmd, Command::ListSources);
    }
}
