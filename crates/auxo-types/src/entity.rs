//! Participants of the discovery protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared kind of a participant.
///
/// Travels on the wire as its upper-case name. Names this build does not know
/// about decode to [`EntityType::Unknown`] so newer peers stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    /// An agent process running an actor.
    Agent,
    /// The central broker.
    Broker,
    /// A worker attached to an agent's local endpoint.
    Worker,
    /// A type introduced by a newer protocol revision.
    Unknown(String),
}

impl EntityType {
    /// Wire name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Agent => "AGENT",
            Self::Broker => "BROKER",
            Self::Worker => "WORKER",
            Self::Unknown(name) => name,
        }
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "AGENT" => Self::Agent,
            "BROKER" => Self::Broker,
            "WORKER" => Self::Worker,
            _ => Self::Unknown(name),
        }
    }
}

impl From<EntityType> for String {
    fn from(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed participant.
///
/// The transport identity (assigned by the broker's router per connection) is
/// not part of the entity; it is the key under which the broker records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Declared type.
    pub entity_type: EntityType,
    /// Optional human-readable name (e.g. the agent name from config).
    #[serde(default)]
    pub name: Option<String>,
}

impl Entity {
    /// An anonymous entity of the given type.
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            name: None,
        }
    }

    /// A named agent.
    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            entity_type: EntityType::Agent,
            name: Some(name.into()),
        }
    }

    /// The broker.
    pub fn broker() -> Self {
        Self::new(EntityType::Broker)
    }

    /// Name if present, otherwise the type.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.entity_type.as_str())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({name})", self.entity_type),
            None => write!(f, "{}", self.entity_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_names_round_trip() {
        for t in [EntityType::Agent, EntityType::Broker, EntityType::Worker] {
            let name: String = t.clone().into();
            assert_eq!(EntityType::from(name), t);
        }
    }

    #[test]
    fn test_unknown_entity_type_is_preserved() {
        let t = EntityType::from("SCHEDULER".to_string());
        assert_eq!(t, EntityType::Unknown("SCHEDULER".to_string()));
        assert_eq!(t.to_string(), "SCHEDULER");
    }

    #[test]
    fn test_entity_label() {
        assert_eq!(Entity::agent("apollo-1").label(), "apollo-1");
        assert_eq!(Entity::broker().label(), "BROKER");
        assert_eq!(Entity::agent("apollo-1").to_string(), "AGENT(apollo-1)");
    }
}
