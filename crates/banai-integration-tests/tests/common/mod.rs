//! Shared harness for integration tests.

use std::sync::Arc;

use banai_runtime::{Host, ScriptContext, ScriptException};
use banai_test::{MockContainerEngine, TempTree, test_host};
use serde_json::Value;

/// A host, one script context and the temp tree it is rooted in.
#[allow(dead_code)]
pub struct Harness {
    /// Host under test.
    pub host: Host,
    /// Context rooted at `tree`.
    pub ctx: ScriptContext,
    /// Container engine handle shared with the host.
    pub engine: MockContainerEngine,
    /// Workspace directory (held to prevent cleanup).
    pub tree: TempTree,
}

#[allow(dead_code)]
impl Harness {
    /// Harness over an empty tree.
    pub fn new() -> Self {
        Self::with_tree(TempTree::new())
    }

    /// Harness over `tree` with an empty container engine.
    pub fn with_tree(tree: TempTree) -> Self {
        Self::with_engine(tree, MockContainerEngine::new())
    }

    /// Harness over `tree` and `engine`.
    pub fn with_engine(tree: TempTree, engine: MockContainerEngine) -> Self {
        banai_test::init_test_logging();
        let host = test_host(Arc::new(engine.clone()));
        let ctx = host.new_script_context(tree.path());
        Self {
            host,
            ctx,
            engine,
            tree,
        }
    }

    /// Call a builtin in this harness's context.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, ScriptException> {
        self.host.call(&self.ctx, name, args).await
    }

    /// Call a builtin that must succeed.
    pub async fn ok(&self, name: &str, args: Vec<Value>) -> Value {
        match self.call(name, args).await {
            Ok(v) => v,
            Err(e) => panic!("{name} failed: {e}"),
        }
    }
}
