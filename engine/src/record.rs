//! Remote records and the local entities they are reconciled into.

use crate::{error::Result, Error, Identifier, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record as delivered by a [`RemoteFetcher`](crate::RemoteFetcher).
///
/// Fields keep their arrival order. Setting a field that already exists
/// replaces its value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteRecord {
    fields: Vec<(String, Value)>,
}

impl RemoteRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Build a record from a JSON object.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        let obj = match json {
            serde_json::Value::Object(obj) => obj,
            _ => return Err(Error::InvalidPage("record must be an object".into())),
        };

        let mut record = Self::new();
        for (name, value) in obj {
            let value = Value::from_json(&name, value)?;
            record.set(name, value);
        }
        Ok(record)
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Get a field value. `None` means the field is absent, which is
    /// distinct from a present `Value::Null`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a field, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(index).1)
    }

    /// Iterate fields in arrival order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Extract the identifier stored under `id_field`.
    pub fn identifier(&self, id_field: &str) -> Result<Identifier> {
        let value = self
            .get(id_field)
            .ok_or_else(|| Error::MissingIdentifier(id_field.to_string()))?;
        Identifier::from_value(id_field, value)
    }
}

/// The persisted, locally owned copy of a remote entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEntity {
    /// Identifier shared with the remote record
    pub id: Identifier,
    /// Synced field values, excluding the identifier
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl LocalEntity {
    /// Create an entity with no fields.
    pub fn new(id: impl Into<Identifier>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Set `name` only if it differs from the stored value.
    ///
    /// A missing field compares equal to `Value::Null`. Returns whether the
    /// entity changed.
    pub fn update_if_changed(&mut self, name: &str, value: &Value) -> bool {
        if self.get(name).unwrap_or(&Value::Null) == value {
            return false;
        }
        self.fields.insert(name.to_string(), value.clone());
        true
    }
}
