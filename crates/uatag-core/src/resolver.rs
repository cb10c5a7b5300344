// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Display name to node address table.
//!
//! Built once at startup from configuration. Lookups are exact: there is no
//! prefix matching and no fallback address.

use std::collections::HashMap;

use crate::types::NodeAddress;

/// Static mapping from tag display name to node address.
#[derive(Debug, Clone, Default)]
pub struct AddressResolver {
    table: HashMap<String, NodeAddress>,
}

impl AddressResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry. Returns the previous address, if any.
    pub fn insert(&mut self, name: impl Into<String>, address: NodeAddress) -> Option<NodeAddress> {
        self.table.insert(name.into(), address)
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, address: NodeAddress) -> Self {
        self.insert(name, address);
        self
    }

    /// Resolves a display name.
    pub fn resolve(&self, name: &str) -> Option<&NodeAddress> {
        self.table.get(name)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, NodeAddress)> for AddressResolver {
    fn from_iter<I: IntoIterator<Item = (S, NodeAddress)>>(iter: I) -> Self {
        Self {
            table: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
