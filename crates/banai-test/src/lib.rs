//! Banai Test - shared test utilities for the Banai host crates.
//!
//! Use as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! banai-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use banai_test::{MockContainerEngine, TempTree, test_host};
//!
//! #[tokio::test]
//! async fn test_stop() {
//!     let engine = MockContainerEngine::new().with_running("c1", "web", "nginx");
//!     let host = test_host(Arc::new(engine.clone()));
//!     let tree = TempTree::new();
//!     let ctx = host.new_script_context(tree.path());
//!     host.call(&ctx, "dkrStop", vec!["c1".into()]).await.unwrap();
//!     assert_eq!(engine.stop_calls(), vec!["c1"]);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;
pub mod responder;
pub mod sshd;

pub use fixtures::*;
pub use mocks::*;
pub use responder::*;
pub use sshd::*;

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_test_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
