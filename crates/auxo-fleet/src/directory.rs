//! Entity directory: which remote entities the broker has heard from.
//!
//! The directory is owned by the broker's discovery loop and only ever
//! mutated from there, so it needs no locking. Everyone else asks the loop.

use auxo_types::{Entity, EntityType, Header};
use auxo_wire::Identity;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// One announced entity.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    /// Transport identity of the connection it speaks on.
    pub identity: Identity,
    /// What it says it is.
    pub entity: Entity,
    /// Wall-clock time of the first message.
    pub first_seen: DateTime<Utc>,
    /// Monotonic time of the latest READY or HEARTBEAT.
    pub last_seen: Instant,
    /// Header of the latest recorded message.
    pub last_header: Header,
}

impl EntityRecord {
    pub fn is_live(&self, now: Instant, liveness_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) <= liveness_timeout
    }
}

/// Directory of announced entities keyed by transport identity.
#[derive(Debug)]
pub struct EntityDirectory {
    entries: HashMap<Identity, EntityRecord>,
    liveness_timeout: Duration,
}

impl EntityDirectory {
    pub fn new(liveness_timeout: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            liveness_timeout,
        }
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }

    /// Insert or refresh the entity behind `identity`.
    ///
    /// Returns `true` when the identity was not known before. A repeated
    /// READY updates the existing record and keeps `first_seen`.
    pub fn record(
        &mut self,
        identity: Identity,
        entity: &Entity,
        header: &Header,
        now: Instant,
    ) -> bool {
        match self.entries.get_mut(&identity) {
            Some(record) => {
                record.entity = entity.clone();
                record.last_seen = now;
                record.last_header = header.clone();
                false
            }
            None => {
                self.entries.insert(
                    identity,
                    EntityRecord {
                        identity,
                        entity: entity.clone(),
                        first_seen: Utc::now(),
                        last_seen: now,
                        last_header: header.clone(),
                    },
                );
                true
            }
        }
    }

    pub fn remove(&mut self, identity: Identity) -> Option<EntityRecord> {
        self.entries.remove(&identity)
    }

    /// Drop every entry silent for longer than the liveness timeout.
    pub fn evict_expired(&mut self, now: Instant) -> Vec<EntityRecord> {
        let timeout = self.liveness_timeout;
        let expired: Vec<Identity> = self
            .entries
            .values()
            .filter(|r| !r.is_live(now, timeout))
            .map(|r| r.identity)
            .collect();
        expired
            .into_iter()
            .filter_map(|identity| self.entries.remove(&identity))
            .collect()
    }

    /// Number of live entries of the given type.
    pub fn live_count(&self, entity_type: &EntityType, now: Instant) -> usize {
        self.entries
            .values()
            .filter(|r| &r.entity.entity_type == entity_type)
            .filter(|r| r.is_live(now, self.liveness_timeout))
            .count()
    }

    pub fn is_live(&self, identity: Identity, now: Instant) -> bool {
        self.entries
            .get(&identity)
            .is_some_and(|r| r.is_live(now, self.liveness_timeout))
    }

    pub fn get(&self, identity: Identity) -> Option<&EntityRecord> {
        self.entries.get(&identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
