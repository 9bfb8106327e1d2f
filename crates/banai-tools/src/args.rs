//! Positional argument access for builtins.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CapabilityError, ToolResult};

/// Positional arguments of one builtin call.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Value>);

impl Args {
    /// Wrap evaluator-provided values.
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no arguments were passed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw argument at `idx`.
    #[must_use]
    pub fn raw(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx).filter(|v| !v.is_null())
    }

    /// Required argument, deserialized.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::Config`] when missing, null or of the wrong shape.
    pub fn required<T: DeserializeOwned>(&self, idx: usize, name: &str) -> ToolResult<T> {
        match self.raw(idx) {
            Some(v) => decode(v, idx, name),
            None => Err(CapabilityError::config(format!(
                "argument {} ({name}) is required",
                display_index(idx)
            ))),
        }
    }

    /// Optional argument; missing and null both yield `None`.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::Config`] when present but of the wrong shape.
    pub fn optional<T: DeserializeOwned>(&self, idx: usize, name: &str) -> ToolResult<Option<T>> {
        self.raw(idx).map(|v| decode(v, idx, name)).transpose()
    }

    /// Required non-empty string.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::Config`] when missing, not a string or blank.
    pub fn string(&self, idx: usize, name: &str) -> ToolResult<String> {
        let s: String = self.required(idx, name)?;
        if s.trim().is_empty() {
            return Err(CapabilityError::config(format!(
                "argument {} ({name}) must not be empty",
                display_index(idx)
            )));
        }
        Ok(s)
    }

    /// Every argument from `from` onwards as strings.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::Config`] if any of them is not a string.
    pub fn rest_strings(&self, from: usize) -> ToolResult<Vec<String>> {
        self.0
            .iter()
            .enumerate()
            .skip(from)
            .map(|(idx, v)| decode(v, idx, "part"))
            .collect()
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

fn decode<T: DeserializeOwned>(v: &Value, idx: usize, name: &str) -> ToolResult<T> {
    T::deserialize(v).map_err(|e| {
        CapabilityError::config(format!("argument {} ({name}): {e}", display_index(idx)))
    })
}

fn display_index(idx: usize) -> usize {
    idx.saturating_add(1)
}
