//! Colour-to-label mapping for annotation categories.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Colours offered when a working set starts without a saved mapping.
pub const DEFAULT_PALETTE: &[&str] = &["blue", "lime green", "yellow", "red", "deep pink"];

/// The colour-to-label mapping that names every annotation.
///
/// Keys are colour names, values are the labels drawn in that colour. The
/// map is the single source of category names; renaming a label here is
/// what drives the cross-image rename of committed annotations. Entries are
/// kept in a sorted map so the exported file is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColourMap {
    entries: BTreeMap<String, String>,
}

impl Default for ColourMap {
    /// Each palette colour starts out labelled with its own name.
    fn default() -> Self {
        let entries = DEFAULT_PALETTE
            .iter()
            .map(|colour| (colour.to_string(), colour.to_string()))
            .collect();
        Self { entries }
    }
}

impl ColourMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The label currently assigned to a colour.
    pub fn label_for(&self, colour: &str) -> Option<&str> {
        self.entries.get(colour).map(String::as_str)
    }

    /// Assign a label to a colour, returning the previous label if the
    /// colour was already mapped.
    pub fn set_label(&mut self, colour: impl Into<String>, label: impl Into<String>) -> Option<String> {
        self.entries.insert(colour.into(), label.into())
    }

    /// Reverse lookup: the first colour carrying this label, in colour
    /// name order.
    pub fn colour_for_label(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.as_str() == label)
            .map(|(colour, _)| colour.as_str())
    }

    /// Colour used for annotations whose label has no mapping, such as
    /// datasets edited outside the tool.
    pub fn fallback_colour(&self) -> &str {
        self.entries
            .keys()
            .next()
            .map(String::as_str)
            .unwrap_or(DEFAULT_PALETTE[0])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(colour, label)| (colour.as_str(), label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
