//! Banai host runtime.
//!
//! A [`Host`] is built once per process. It owns the secret vault, the
//! container engine, the HTTP client cache and the builtin registry, and
//! hands out one [`ScriptContext`] per script execution.
//!
//! ```rust,no_run
//! use banai_runtime::Host;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (host, _resolved) = Host::load(None)?;
//! let ctx = host.new_script_context(std::env::current_dir()?);
//! let result = host.call(&ctx, "sh", vec![json!("echo hello")]).await?;
//! assert_eq!(result["status"], 0);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod config_bridge;

mod error;
mod host;

pub use error::{HostError, HostResult};
pub use host::{Host, HostBuilder};

pub use banai_tools::{ScriptContext, ScriptException, ToolRegistry, ToolSettings};
