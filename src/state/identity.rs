use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable attributes read from an element when it is enumerated.
///
/// Doubles as the locator used to find the element again during replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementAttributes {
    pub resource_id: String,
    pub label: String, // accessibility label / content-desc
    pub text: String,
}

impl ElementAttributes {
    pub fn new(
        resource_id: impl Into<String>,
        label: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            label: label.into(),
            text: text.into(),
        }
    }

    pub fn identity(&self) -> ElementIdentity {
        element_identity(&self.resource_id, &self.label, &self.text)
    }

    pub fn is_blank(&self) -> bool {
        self.resource_id.is_empty() && self.label.is_empty() && self.text.is_empty()
    }
}

/// Deduplication key for an element.
///
/// Global across screens: two elements with the same attribute triple are the
/// same identity wherever they appear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementIdentity(String);

impl ElementIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// All-empty triples collapse to the single identity "--".
pub fn element_identity(resource_id: &str, label: &str, text: &str) -> ElementIdentity {
    ElementIdentity(format!("{resource_id}-{label}-{text}"))
}
