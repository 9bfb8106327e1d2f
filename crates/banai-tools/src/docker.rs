//! Container control through the engine API.

use std::time::Duration;

use bollard::errors::Error as BollardError;
use bollard::query_parameters::{
    InspectContainerOptions, ListContainersOptionsBuilder, StopContainerOptionsBuilder,
};
use bollard::{API_DEFAULT_VERSION, Docker};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::envelope::to_value;
use crate::error::{CapabilityError, ToolResult};
use crate::{Args, BuiltinTool, ScriptContext};

const SERVICE: &str = "container engine";

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Running.
    Running,
    /// Exited.
    Stopped,
    /// Paused.
    Paused,
    /// Restarting.
    Restarting,
    /// Created but never started.
    Created,
    /// Being removed.
    Removing,
    /// Dead.
    Dead,
    /// Anything the engine reports that we do not know.
    Unknown,
}

impl ContainerStatus {
    /// Map the engine's state string.
    #[must_use]
    pub fn from_engine(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "exited" | "stopped" => Self::Stopped,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "created" => Self::Created,
            "removing" => Self::Removing,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

/// One container as listed by the engine. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRef {
    /// Full id.
    pub id: String,
    /// Primary name without the leading `/`.
    pub name: String,
    /// Current state.
    pub status: ContainerStatus,
    /// Image reference.
    pub image: String,
}

/// Operations the controller needs from a container engine.
#[async_trait::async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Every container, running or not.
    async fn list(&self) -> ToolResult<Vec<ContainerRef>>;

    /// Stop `id`, killing it after `grace`. Already stopped is success.
    async fn stop(&self, id: &str, grace: Duration) -> ToolResult<()>;
}

/// Engine reached through `bollard`.
pub struct BollardEngine {
    docker: Docker,
}

impl BollardEngine {
    /// Client for `socket`, or the platform default when `None`.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::Unavailable`] if the client cannot be built.
    pub fn connect(socket: Option<&str>, timeout_secs: u64) -> ToolResult<Self> {
        let docker = match socket {
            Some(path) => Docker::connect_with_socket(path, timeout_secs, API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| unavailable(&e))?;
        Ok(Self { docker })
    }

    async fn is_running(&self, id: &str) -> ToolResult<bool> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| classify(id, &e))?;
        let json = serde_json::to_value(&inspect).unwrap_or(Value::Null);
        Ok(json
            .pointer("/State/Running")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }
}

#[async_trait::async_trait]
impl ContainerEngine for BollardEngine {
    fn name(&self) -> &'static str {
        "bollard"
    }

    async fn list(&self) -> ToolResult<Vec<ContainerRef>> {
        let options = ListContainersOptionsBuilder::new().all(true).build();
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| unavailable(&e))?;
        Ok(summaries
            .iter()
            .map(|s| {
                // State is read through JSON so the enum/string shape does not matter.
                let state = serde_json::to_value(s)
                    .ok()
                    .and_then(|v| v.get("State").and_then(Value::as_str).map(str::to_owned))
                    .unwrap_or_default();
                ContainerRef {
                    id: s.id.clone().unwrap_or_default(),
                    name: s
                        .names
                        .as_ref()
                        .and_then(|n| n.first())
                        .map(|n| n.trim_start_matches('/').to_owned())
                        .unwrap_or_default(),
                    status: ContainerStatus::from_engine(&state),
                    image: s.image.clone().unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn stop(&self, id: &str, grace: Duration) -> ToolResult<()> {
        if !self.is_running(id).await? {
            debug!(container = id, "already stopped");
            return Ok(());
        }
        let t = i32::try_from(grace.as_secs()).unwrap_or(i32::MAX);
        let options = StopContainerOptionsBuilder::new().t(t).build();
        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(classify(id, &e)),
        }
    }
}

/// Stand-in used when no engine client could be built.
#[derive(Debug, Clone)]
pub struct UnavailableEngine {
    reason: String,
}

impl UnavailableEngine {
    /// Engine that fails every call with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> CapabilityError {
        CapabilityError::Unavailable {
            service: SERVICE,
            reason: self.reason.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ContainerEngine for UnavailableEngine {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn list(&self) -> ToolResult<Vec<ContainerRef>> {
        Err(self.error())
    }

    async fn stop(&self, _id: &str, _grace: Duration) -> ToolResult<()> {
        Err(self.error())
    }
}

fn unavailable(e: &BollardError) -> CapabilityError {
    CapabilityError::Unavailable {
        service: SERVICE,
        reason: e.to_string(),
    }
}

fn classify(id: &str, e: &BollardError) -> CapabilityError {
    match e {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => CapabilityError::NotFound(format!("container {id}")),
        other => {
            warn!(container = id, error = %other, "container engine call failed");
            unavailable(other)
        },
    }
}

/// `dkrList()`
pub struct DkrListTool;

#[async_trait::async_trait]
impl BuiltinTool for DkrListTool {
    fn name(&self) -> &'static str {
        "dkrList"
    }

    fn description(&self) -> &'static str {
        "Lists all containers as [{id, name, status, image}]."
    }

    async fn execute(&self, _args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let containers = ctx.services().containers.list().await?;
        debug!(count = containers.len(), "listed containers");
        to_value(&containers)
    }
}

/// `dkrStop(id)`
pub struct DkrStopTool;

#[async_trait::async_trait]
impl BuiltinTool for DkrStopTool {
    fn name(&self) -> &'static str {
        "dkrStop"
    }

    fn description(&self) -> &'static str {
        "Stops a container by id or name; stopping a stopped container succeeds."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let id = args.string(0, "containerId")?;
        let grace = ctx.settings().docker_stop_grace;
        ctx.services().containers.stop(&id, grace).await?;
        info!(container = %id, "container stopped");
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::ErrorKind;
    use crate::testing::{FakeEngine, args, services_with};
    use serde_json::json;

    fn fake() -> Arc<FakeEngine> {
        Arc::new(FakeEngine {
            containers: vec![
                ContainerRef {
                    id: "aaa111".into(),
                    name: "web".into(),
                    status: ContainerStatus::Running,
                    image: "nginx:1".into(),
                },
                ContainerRef {
                    id: "bbb222".into(),
                    name: "batch".into(),
                    status: ContainerStatus::Stopped,
                    image: "busybox".into(),
                },
            ],
            stopped: Mutex::new(Vec::new()),
        })
    }

    fn ctx_with(engine: Arc<dyn ContainerEngine>) -> (tempfile::TempDir, ScriptContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ScriptContext::new(services_with(engine), dir.path().to_path_buf());
        (dir, ctx)
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ContainerStatus::from_engine("running"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::from_engine("EXITED"), ContainerStatus::Stopped);
        assert_eq!(ContainerStatus::from_engine("weird"), ContainerStatus::Unknown);
    }

    #[tokio::test]
    async fn test_list_shape() {
        let (_dir, ctx) = ctx_with(fake());
        let v = DkrListTool.execute(args(vec![]), &ctx).await.unwrap();
        assert_eq!(
            v[0],
            json!({"id": "aaa111", "name": "web", "status": "running", "image": "nginx:1"})
        );
        assert_eq!(v[1]["status"], "stopped");
    }

    #[tokio::test]
    async fn test_stop_idempotent_and_not_found() {
        let engine = fake();
        let (_dir, ctx) = ctx_with(engine.clone());
        DkrStopTool
            .execute(args(vec![json!("web")]), &ctx)
            .await
            .unwrap();
        DkrStopTool
            .execute(args(vec![json!("bbb222")]), &ctx)
            .await
            .unwrap();
        assert_eq!(*engine.stopped.lock().unwrap(), vec!["aaa111".to_owned()]);

        let err = DkrStopTool
            .execute(args(vec![json!("ghost")]), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unavailable_engine() {
        let (_dir, ctx) = ctx_with(Arc::new(UnavailableEngine::new("socket missing")));
        let err = DkrListTool.execute(args(vec![]), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().contains("socket missing"));
    }

    #[tokio::test]
    async fn test_bollard_unreachable_socket_is_unavailable() {
        let err = match BollardEngine::connect(Some("/nonexistent/banai-docker.sock"), 2) {
            Ok(engine) => engine.list().await.unwrap_err(),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
