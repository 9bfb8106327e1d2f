//! Result values returned to scripts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CapabilityError, ToolResult};

/// Outcome of a local or remote process.
///
/// A non-zero `status` is data, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellResult {
    /// Captured standard output, lossily decoded as UTF-8.
    pub out: String,
    /// Captured standard error.
    pub err: String,
    /// Exit status. `-1` if the process never reported one.
    pub status: i64,
}

impl ShellResult {
    /// Build from raw captured bytes.
    #[must_use]
    pub fn from_bytes(out: &[u8], err: &[u8], status: i64) -> Self {
        Self {
            out: String::from_utf8_lossy(out).into_owned(),
            err: String::from_utf8_lossy(err).into_owned(),
            status,
        }
    }

    /// Whether the process exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Serialize any result into the JSON value handed back to the script.
pub(crate) fn to_value<T: Serialize>(value: &T) -> ToolResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| CapabilityError::config(format!("unrepresentable result: {e}")))
}
