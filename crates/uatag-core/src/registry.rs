// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tag registry.
//!
//! Holds the tag catalog and the last applied value of every tag, in
//! registration order. Reads return snapshots; the only mutation after
//! startup is [`TagRegistry::upsert`], which is crate-private and called
//! exclusively by the consumer while draining the action queue.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{DataType, Tag};

#[derive(Debug, Default)]
struct Inner {
    tags: Vec<Tag>,
    index: HashMap<String, usize>,
}

/// Catalog of tags keyed by display name.
#[derive(Debug, Default)]
pub struct TagRegistry {
    inner: RwLock<Inner>,
}

/// Outcome of [`TagRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upsert {
    /// An existing tag was overwritten.
    Updated,
    /// The tag did not exist and was created.
    Created,
}

impl TagRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from a catalog, keeping its order.
    ///
    /// Duplicate names keep their first occurrence.
    pub fn from_catalog<I, S>(catalog: I) -> Self
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        let registry = Self::new();
        for (name, data_type) in catalog {
            registry.register(name, data_type);
        }
        registry
    }

    /// Appends a tag unless the name is already registered.
    ///
    /// Returns `true` if the tag was added.
    pub fn register(&self, name: impl Into<String>, data_type: DataType) -> bool {
        let name = name.into();
        let mut inner = self.inner.write();
        if inner.index.contains_key(&name) {
            tracing::debug!(tag = %name, "Tag already registered");
            return false;
        }
        let position = inner.tags.len();
        inner.tags.push(Tag::new(name.clone(), data_type));
        inner.index.insert(name, position);
        true
    }

    /// Looks up a tag by exact name.
    pub fn find(&self, name: &str) -> Option<Tag> {
        let inner = self.inner.read();
        inner.index.get(name).map(|&i| inner.tags[i].clone())
    }

    /// Returns the current data type of a tag.
    pub fn data_type(&self, name: &str) -> Option<DataType> {
        let inner = self.inner.read();
        inner.index.get(name).map(|&i| inner.tags[i].data_type)
    }

    /// Returns `true` if the name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().index.contains_key(name)
    }

    /// Returns all tags in registration order.
    pub fn snapshot(&self) -> Vec<Tag> {
        self.inner.read().tags.clone()
    }

    /// Returns all names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .tags
            .iter()
            .map(|t| t.display_name.clone())
            .collect()
    }

    /// Returns the number of tags.
    pub fn len(&self) -> usize {
        self.inner.read().tags.len()
    }

    /// Returns `true` if no tag is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrites the value of a tag, creating it if absent, and returns the
    /// updated record.
    pub(crate) fn upsert(
        &self,
        name: &str,
        value: String,
        source_timestamp: String,
        data_type: DataType,
    ) -> (Tag, Upsert) {
        let mut inner = self.inner.write();
        match inner.index.get(name).copied() {
            Some(i) => {
                let tag = &mut inner.tags[i];
                tag.value = value;
                tag.source_timestamp = source_timestamp;
                tag.data_type = data_type;
                (tag.clone(), Upsert::Updated)
            }
            None => {
                let tag = Tag {
                    display_name: name.to_string(),
                    value,
                    source_timestamp,
                    data_type,
                };
                let position = inner.tags.len();
                inner.tags.push(tag.clone());
                inner.index.insert(name.to_string(), position);
                (tag, Upsert::Created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let registry = TagRegistry::new();
        assert!(registry.register("Power_system", DataType::Boolean));
        assert!(!registry.register("Power_system", DataType::Boolean));
        assert!(!registry.register("Power_system", DataType::Int32));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.data_type("Power_system"), Some(DataType::Boolean));
    }

    #[test]
    fn test_from_catalog_keeps_order() {
        let registry = TagRegistry::from_catalog([
            ("System_State", DataType::String),
            ("DriveX.fActPosition", DataType::Double),
            ("System_State", DataType::String),
            ("Auto_Mode", DataType::Boolean),
        ]);
        assert_eq!(
            registry.names(),
            vec!["System_State", "DriveX.fActPosition", "Auto_Mode"]
        );
    }

    #[test]
    fn test_find_exact_match() {
        let registry = TagRegistry::from_catalog([("Auto_Mode", DataType::Boolean)]);
        assert!(registry.find("Auto_Mode").is_some());
        assert!(registry.find("auto_mode").is_none());
        assert!(registry.find("Auto_Mode ").is_none());
    }

    #[test]
    fn test_upsert_updates_and_creates() {
        let registry = TagRegistry::from_catalog([("X_postion", DataType::Double)]);

        let (tag, outcome) = registry.upsert(
            "X_postion",
            "12.5".into(),
            "2025-01-01T00:00:00+00:00".into(),
            DataType::Double,
        );
        assert_eq!(outcome, Upsert::Updated);
        assert_eq!(tag.value, "12.5");
        assert_eq!(registry.len(), 1);

        let (tag, outcome) = registry.upsert("CurrentTime", "now".into(), String::new(), DataType::DateTime);
        assert_eq!(outcome, Upsert::Created);
        assert_eq!(tag.data_type, DataType::DateTime);
        assert_eq!(registry.names(), vec!["X_postion", "CurrentTime"]);
    }

    #[test]
    fn test_find_returns_snapshot() {
        let registry = TagRegistry::from_catalog([("Sen5_", DataType::Boolean)]);
        let before = registry.find("Sen5_").unwrap();
        registry.upsert("Sen5_", "true".into(), String::new(), DataType::Boolean);
        assert!(before.value.is_empty());
        assert_eq!(registry.find("Sen5_").unwrap().value, "true");
    }
}
