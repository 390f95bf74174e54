use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::entity::EntityKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("activity references {kind} {id}, which does not exist")]
    MissingReference { kind: EntityKind, id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Field-level messages produced at the form boundary, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for `field`. The first message per field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        for (index, (field, message)) in self.fields.iter().enumerate() {
            let sep = if index == 0 { ": " } else { "; " };
            write!(f, "{sep}{field}: {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_message_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "Email is required");
        errors.add("email", "Invalid email address");
        errors.add("name", "Name is required");

        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(
            errors.to_string(),
            "validation failed: email: Email is required; name: Name is required"
        );
    }

    #[test]
    fn store_errors_name_the_kind() {
        let err = StoreError::NotFound {
            kind: EntityKind::Project,
            id: 7,
        };
        assert_eq!(err.to_string(), "project 7 not found");
    }
}
