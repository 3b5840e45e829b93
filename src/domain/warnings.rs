//! Validation warnings returned by entity saves and manipulators.

use serde::Serialize;

/// One validation problem. `field` names the offending input field when
/// the problem is attributable to one; general warnings leave it unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub field: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    /// The stock "Title is empty." style warning for a required field left
    /// blank.
    pub fn empty_field(field: &str) -> Self {
        let mut label = field.to_string();
        if let Some(first) = label.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        Self::field(field, format!("{label} is empty."))
    }
}
