//! Banai Telemetry - Logging and call tracing for the Banai script host.
//!
//! This crate provides:
//! - Subscriber setup with pretty, compact, JSON and full formats
//! - Rolling file output
//! - A per-builtin-call context whose span correlates every event of a call
//!
//! # Example
//!
//! ```rust,no_run
//! use banai_telemetry::{CallContext, LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), banai_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("banai_tools::remote=trace");
//! setup_logging(&config)?;
//!
//! let call = CallContext::new(uuid::Uuid::new_v4(), "sh");
//! let _guard = call.span().entered();
//! tracing::info!("running");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

#[cfg(feature = "config")]
mod bridge;
mod context;
mod error;
mod logging;

pub use context::CallContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging,
};
