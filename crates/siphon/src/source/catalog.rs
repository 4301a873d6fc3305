//! Element capability catalog.
//!
//! The catalog is loaded once at startup and handed to the controller as a
//! read-only capability map: which operations each data element supports,
//! which fetch strategies are available for them, and the ordered field list
//! the loader table expects. Nothing here is mutated after load.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Which fetch strategies an (element, operation) pair supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationSupport {
    /// The source can report an upfront record count for this operation.
    pub counted: bool,
    /// The source accepts filtered/query access for this operation.
    pub filtered: bool,
}

/// Capabilities of one remote data element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementCapabilities {
    /// Ordered field list; defines the loader table's column order.
    pub fields: Vec<String>,
    /// Supported operations keyed by operation name.
    pub operations: BTreeMap<String, OperationSupport>,
}

/// Read-only capability map for every syncable element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementCatalog {
    elements: BTreeMap<String, ElementCapabilities>,
    /// Elements forced onto counted pagination because they are known to
    /// return wrong results under filtering.
    force_counted: BTreeSet<String>,
}

impl ElementCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element's capabilities (builder style).
    #[must_use]
    pub fn with_element(mut self, name: impl Into<String>, caps: ElementCapabilities) -> Self {
        self.elements.insert(name.into(), caps);
        self
    }

    /// Force an element onto counted pagination (builder style).
    #[must_use]
    pub fn with_force_counted(mut self, name: impl Into<String>) -> Self {
        self.force_counted.insert(name.into());
        self
    }

    /// Look up an element's capabilities.
    pub fn get(&self, element: &str) -> Option<&ElementCapabilities> {
        self.elements.get(element)
    }

    /// Whether the element is on the force-counted override list.
    pub fn is_force_counted(&self, element: &str) -> bool {
        self.force_counted.contains(element)
    }

    /// Names of all cataloged elements.
    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }
}
