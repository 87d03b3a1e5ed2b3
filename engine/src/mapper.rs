//! Mapping remote fields onto local entities.
//!
//! The reconciler knows nothing about entity schemas. It lets a
//! [`FieldMapper`] fill entities and treats an existing entity as changed
//! only when [`FieldMapper::fill_changed`] actually alters it. Mappers that
//! rename or convert fields are therefore free to shape the entity as they
//! like.

use crate::{LocalEntity, RemoteRecord};
use std::collections::BTreeSet;

/// Caller-supplied capability that maps raw record fields onto an entity.
///
/// Records reach the mapper without their identifier field; the identifier
/// is already set on the entity.
pub trait FieldMapper: Send + Sync {
    /// Whether `field` is synced. Unmapped fields are ignored by the
    /// default fill methods.
    fn maps(&self, field: &str) -> bool {
        let _ = field;
        true
    }

    /// Fill an entity seen for the first time.
    fn fill_new(&self, entity: &mut LocalEntity, record: &RemoteRecord) {
        copy_mapped(self, entity, record);
    }

    /// Apply `record` to a copy of an existing entity.
    ///
    /// The entity is written back and reported as updated only if this
    /// leaves it different from the stored one. Implementations must be
    /// deterministic for that comparison to hold.
    fn fill_changed(&self, entity: &mut LocalEntity, record: &RemoteRecord) {
        copy_mapped(self, entity, record);
    }
}

/// Copy every mapped field present in `record` onto `entity`.
///
/// A `null` value clears the local field. Fields absent from `record` are
/// left untouched.
pub fn copy_mapped<M>(mapper: &M, entity: &mut LocalEntity, record: &RemoteRecord)
where
    M: FieldMapper + ?Sized,
{
    for (name, value) in record.fields() {
        if mapper.maps(name) {
            entity.update_if_changed(name, value);
        }
    }
}

/// Maps every field verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyFields;

impl FieldMapper for CopyFields {}

/// Maps only the named fields.
#[derive(Debug, Clone, Default)]
pub struct SelectFields {
    fields: BTreeSet<String>,
}

impl SelectFields {
    pub fn new<I, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl FieldMapper for SelectFields {
    fn maps(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn copy_fields_maps_everything() {
        let record = RemoteRecord::new().with("body", "hi").with("pinned", true);
        let mut entity = LocalEntity::new(1);
        CopyFields.fill_new(&mut entity, &record);

        assert_eq!(entity.get("body"), Some(&Value::from("hi")));
        assert_eq!(entity.get("pinned"), Some(&Value::Bool(true)));
    }

    #[test]
    fn select_fields_skips_unmapped() {
        let mapper = SelectFields::new(["body"]);
        let record = RemoteRecord::new().with("body", "hi").with("secret", "x");
        let mut entity = LocalEntity::new(1);
        mapper.fill_new(&mut entity, &record);

        assert_eq!(entity.get("body"), Some(&Value::from("hi")));
        assert_eq!(entity.get("secret"), None);
        assert!(!mapper.maps("secret"));
    }

    #[test]
    fn null_clears_and_absent_keeps() {
        let mut entity = LocalEntity::new(1).with("body", "old").with("title", "t");
        let record = RemoteRecord::new().with("body", Value::Null);
        CopyFields.fill_changed(&mut entity, &record);

        assert_eq!(entity.get("body"), Some(&Value::Null));
        assert_eq!(entity.get("title"), Some(&Value::from("t")));
    }
}
