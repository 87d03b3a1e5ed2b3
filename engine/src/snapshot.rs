//! Snapshot types for persisting and restoring committed store state.
//!
//! Snapshots are the bridge between the in-memory store and a file on disk.
//! Entities are kept sorted by identifier so serialization is deterministic.

use crate::{error::Result, Error, Identifier, LocalEntity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time copy of the committed entities of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Name of the synced collection
    pub entity_name: String,
    /// Committed entities, ordered by identifier
    pub entities: Vec<LocalEntity>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            entity_name: entity_name.into(),
            entities: Vec::new(),
        }
    }

    /// Build a snapshot from a map of committed entities.
    pub fn from_entities(
        entity_name: impl Into<String>,
        entities: &BTreeMap<Identifier, LocalEntity>,
    ) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            entity_name: entity_name.into(),
            entities: entities.values().cloned().collect(),
        }
    }

    /// Index the entities by identifier.
    ///
    /// Fails if two entities share an identifier.
    pub fn into_entities(self) -> Result<BTreeMap<Identifier, LocalEntity>> {
        let mut map = BTreeMap::new();
        for entity in self.entities {
            let id = entity.id.clone();
            if map.insert(id.clone(), entity).is_some() {
                return Err(Error::InvalidSnapshot(format!(
                    "duplicate identifier: {}",
                    id
                )));
            }
        }
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip() {
        let mut entities = BTreeMap::new();
        entities.insert(
            Identifier::Int(1),
            LocalEntity::new(1).with("body", "first"),
        );
        entities.insert(Identifier::Int(2), LocalEntity::new(2));

        let snapshot = StoreSnapshot::from_entities("Note", &entities);
        let json = snapshot.to_json_pretty().unwrap();
        let restored = StoreSnapshot::from_json(&json).unwrap();

        assert_eq!(snapshot, restored);
        assert_eq!(restored.into_entities().unwrap(), entities);
    }

    #[test]
    fn deterministic_serialization() {
        let mut a = BTreeMap::new();
        let mut b = BTreeMap::new();
        a.insert(Identifier::from("x"), LocalEntity::new("x"));
        a.insert(Identifier::from("y"), LocalEntity::new("y"));
        b.insert(Identifier::from("y"), LocalEntity::new("y"));
        b.insert(Identifier::from("x"), LocalEntity::new("x"));

        let json_a = StoreSnapshot::from_entities("Note", &a).to_json_pretty().unwrap();
        let json_b = StoreSnapshot::from_entities("Note", &b).to_json_pretty().unwrap();
        assert_eq!(json_a, json_b);
    }

    #[test]
    fn reject_future_format_version() {
        let json = r#"{
            "formatVersion": 999,
            "entityName": "Note",
            "entities": []
        }"#;

        let result = StoreSnapshot::from_json(json);
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn reject_duplicate_identifiers() {
        let mut snapshot = StoreSnapshot::new("Note");
        snapshot.entities.push(LocalEntity::new(1));
        snapshot.entities.push(LocalEntity::new(1));
        assert!(matches!(
            snapshot.into_entities(),
            Err(Error::InvalidSnapshot(_))
        ));
    }
}
