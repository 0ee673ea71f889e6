//! Field-level built-in transforms.
//!
//! - [`InjectFields`] — inserts or overwrites top-level fields.
//! - [`RequireFields`] — rejects payloads that lack a named top-level field.

use serde_json::Value;
use thiserror::Error;

use crate::{BoxError, Payload, middleware::Transform};

/// Inserts a fixed set of top-level fields into every payload.
///
/// Fields already present are overwritten. Configured through the builder
/// method [`field`](Self::field).
///
/// # Examples
///
/// ```
/// use apiweave::middleware::{InjectFields, Transform};
/// use apiweave::Payload;
///
/// let inject = InjectFields::new()
///     .field("cached", true)
///     .field("client", "apiweave");
///
/// let out = inject.apply(Payload::new()).unwrap();
/// assert_eq!(out["cached"], true);
/// assert_eq!(out["client"], "apiweave");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InjectFields {
    fields: Vec<(String, Value)>,
}

impl InjectFields {
    /// Creates an `InjectFields` that injects nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to inject. Later calls with the same name win.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

impl Transform for InjectFields {
    fn apply(&self, mut payload: Payload) -> Result<Payload, BoxError> {
        for (name, value) in &self.fields {
            payload.insert(name.clone(), value.clone());
        }
        Ok(payload)
    }
}

/// Returned by [`RequireFields`] when a required field is absent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("required field {name:?} is missing")]
pub struct MissingField {
    pub name: String,
}

/// Fails the pipeline when any of the named top-level fields is absent.
///
/// A field that is present with a `null` value counts as present.
#[derive(Debug, Clone, Default)]
pub struct RequireFields {
    names: Vec<String>,
}

impl RequireFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field name that must be present.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }
}

impl Transform for RequireFields {
    fn apply(&self, payload: Payload) -> Result<Payload, BoxError> {
        if let Some(name) = self.names.iter().find(|name| !payload.contains_key(*name)) {
            return Err(Box::new(MissingField { name: name.clone() }));
        }
        Ok(payload)
    }
}
