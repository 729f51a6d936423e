//! Discovery protocol envelope exchanged between actors and the broker.
//!
//! A [`DiscoveryMessage`] carries a [`Header`] naming its kind, the origin
//! [`Entity`] and a [`Command`] payload. The header and the command variant
//! must agree: the constructors only build agreeing pairs, and decoders are
//! expected to reject disagreeing ones via [`DiscoveryMessage::is_consistent`].

use crate::entity::Entity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message kind.
///
/// Travels as its upper-case name; unknown names decode to
/// [`Header::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Header {
    /// Sent by an actor once its remote endpoint is connected.
    Ready,
    /// Periodic liveness signal.
    Heartbeat,
    /// Broker acknowledgement of a READY.
    Ack,
    /// Orderly departure.
    Disconnect,
    /// A kind introduced by a newer protocol revision.
    Unknown(String),
}

impl Header {
    /// Wire name of this header.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "READY",
            Self::Heartbeat => "HEARTBEAT",
            Self::Ack => "ACK",
            Self::Disconnect => "DISCONNECT",
            Self::Unknown(name) => name,
        }
    }

    /// Whether a message with this header counts as a sign of life.
    pub fn is_liveness(&self) -> bool {
        matches!(self, Self::Ready | Self::Heartbeat)
    }
}

impl From<String> for Header {
    fn from(name: String) -> Self {
        match name.as_str() {
            "READY" => Self::Ready,
            "HEARTBEAT" => Self::Heartbeat,
            "ACK" => Self::Ack,
            "DISCONNECT" => Self::Disconnect,
            _ => Self::Unknown(name),
        }
    }
}

impl From<Header> for String {
    fn from(header: Header) -> Self {
        match header {
            Header::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// READY carries no body.
    Ready,
    /// HEARTBEAT carries no body.
    Heartbeat,
    /// Broker acknowledgement.
    Ack {
        /// How long the broker keeps an entity without hearing from it.
        liveness_timeout_ms: u64,
    },
    /// Orderly departure.
    Disconnect {
        /// Optional human-readable reason.
        #[serde(default)]
        reason: Option<String>,
    },
    /// A command introduced by a newer protocol revision.
    #[serde(other)]
    Unknown,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Heartbeat => "heartbeat",
            Self::Ack { .. } => "ack",
            Self::Disconnect { .. } => "disconnect",
            Self::Unknown => "unknown",
        }
    }
}

/// The wire envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryMessage {
    header: Header,
    origin: Entity,
    command: Command,
}

impl DiscoveryMessage {
    /// READY from `origin`.
    pub fn ready(origin: Entity) -> Self {
        Self {
            header: Header::Ready,
            origin,
            command: Command::Ready,
        }
    }

    /// HEARTBEAT from `origin`.
    pub fn heartbeat(origin: Entity) -> Self {
        Self {
            header: Header::Heartbeat,
            origin,
            command: Command::Heartbeat,
        }
    }

    /// ACK from the broker.
    pub fn ack(origin: Entity, liveness_timeout_ms: u64) -> Self {
        Self {
            header: Header::Ack,
            origin,
            command: Command::Ack {
                liveness_timeout_ms,
            },
        }
    }

    /// DISCONNECT from `origin`.
    pub fn disconnect(origin: Entity, reason: Option<String>) -> Self {
        Self {
            header: Header::Disconnect,
            origin,
            command: Command::Disconnect { reason },
        }
    }

    /// Message kind.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Sender.
    pub fn origin(&self) -> &Entity {
        &self.origin
    }

    /// Payload.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Whether header and command agree.
    ///
    /// Unknown headers and unknown commands are accepted with each other and
    /// with anything else: a newer peer may pair a new header with a new
    /// command, and an old decoder cannot judge that pairing.
    pub fn is_consistent(&self) -> bool {
        match (&self.header, &self.command) {
            (Header::Unknown(_), _) | (_, Command::Unknown) => true,
            (Header::Ready, Command::Ready) => true,
            (Header::Heartbeat, Command::Heartbeat) => true,
            (Header::Ack, Command::Ack { .. }) => true,
            (Header::Disconnect, Command::Disconnect { .. }) => true,
            _ => false,
        }
    }

    /// Short description of a disagreeing pair, for error messages.
    pub fn mismatch_description(&self) -> String {
        format!(
            "header {} does not agree with command {}",
            self.header,
            self.command.name()
        )
    }
}

impl fmt::Display for DiscoveryMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.header, self.origin)
    }
}
