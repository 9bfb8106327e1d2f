//! Per-call correlation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one builtin invocation inside one script execution.
///
/// Every event logged while the call's span is entered carries `call_id`,
/// `script_id` and `builtin`, so interleaved output from concurrent scripts
/// can be separated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContext {
    /// Unique id of this call.
    pub call_id: Uuid,
    /// Id of the script execution making the call.
    pub script_id: Uuid,
    /// Builtin name as the script spelled it.
    pub builtin: String,
    /// When the call started.
    pub started_at: DateTime<Utc>,
}

impl CallContext {
    /// Start a new call context.
    #[must_use]
    pub fn new(script_id: Uuid, builtin: impl Into<String>) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            script_id,
            builtin: builtin.into(),
            started_at: Utc::now(),
        }
    }

    /// Time since the call started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        // started_at is never in the future
        #[allow(clippy::arithmetic_side_effects)]
        let elapsed = Utc::now() - self.started_at;
        elapsed
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed().num_milliseconds()
    }

    /// Span carrying this call's identifiers.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "builtin",
            call_id = %self.short_id(),
            script_id = %self.script_id,
            builtin = %self.builtin,
        )
    }

    /// First eight characters of the call id.
    #[must_use]
    pub fn short_id(&self) -> String {
        let mut id = self.call_id.simple().to_string();
        id.truncate(8);
        id
    }
}
