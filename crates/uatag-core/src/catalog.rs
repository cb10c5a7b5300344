// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Startup tag catalog.

use serde::{Deserialize, Serialize};

use crate::registry::TagRegistry;
use crate::resolver::AddressResolver;
use crate::types::{DataType, NodeAddress};

/// One declared tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display name.
    pub name: String,
    /// Expected data type.
    pub data_type: DataType,
    /// Node address; tags without one are registered but not subscribed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<NodeAddress>,
}

/// Ordered list of declared tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagCatalog {
    entries: Vec<CatalogEntry>,
}

impl TagCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an addressed tag.
    pub fn tag(mut self, name: impl Into<String>, data_type: DataType, address: NodeAddress) -> Self {
        self.entries.push(CatalogEntry {
            name: name.into(),
            data_type,
            address: Some(address),
        });
        self
    }

    /// Adds a tag without an address.
    pub fn unaddressed(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.entries.push(CatalogEntry {
            name: name.into(),
            data_type,
            address: None,
        });
        self
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: CatalogEntry) {
        self.entries.push(entry);
    }

    /// Returns the entries in declaration order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the tag registry.
    pub fn registry(&self) -> TagRegistry {
        TagRegistry::from_catalog(self.entries.iter().map(|e| (e.name.clone(), e.data_type)))
    }

    /// Builds the address table from the addressed entries.
    pub fn resolver(&self) -> AddressResolver {
        self.entries
            .iter()
            .filter_map(|e| e.address.clone().map(|a| (e.name.clone(), a)))
            .collect()
    }
}

impl FromIterator<CatalogEntry> for TagCatalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_and_resolver() {
        let catalog = TagCatalog::new()
            .tag("Power_system", DataType::Boolean, NodeAddress::string(4, "PLC_PRG.Power_system"))
            .unaddressed("Spare", DataType::Int16)
            .tag("Power_system", DataType::Boolean, NodeAddress::string(4, "PLC_PRG.Other"));

        let registry = catalog.registry();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Power_system", "Spare"]);

        let resolver = catalog.resolver();
        assert_eq!(resolver.len(), 1);
        assert!(resolver.resolve("Spare").is_none());
    }
}
