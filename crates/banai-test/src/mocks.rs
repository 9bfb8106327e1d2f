//! Mock container engine.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use banai_tools::{CapabilityError, ContainerEngine, ContainerRef, ContainerStatus, ToolResult};

#[derive(Debug, Default)]
struct EngineState {
    containers: Vec<ContainerRef>,
    stops: Vec<(String, Duration)>,
    unreachable: Option<String>,
}

/// In-memory [`ContainerEngine`]. Clones share state, so a test can keep a
/// handle after giving one to the host.
#[derive(Debug, Clone, Default)]
pub struct MockContainerEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MockContainerEngine {
    /// Engine with no containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container.
    #[must_use]
    pub fn with_container(
        self,
        id: &str,
        name: &str,
        status: ContainerStatus,
        image: &str,
    ) -> Self {
        self.lock().containers.push(ContainerRef {
            id: id.to_owned(),
            name: name.to_owned(),
            status,
            image: image.to_owned(),
        });
        self
    }

    /// Add a running container.
    #[must_use]
    pub fn with_running(self, id: &str, name: &str, image: &str) -> Self {
        self.with_container(id, name, ContainerStatus::Running, image)
    }

    /// Every call fails with `UnavailableError`.
    #[must_use]
    pub fn unreachable(self, reason: &str) -> Self {
        self.lock().unreachable = Some(reason.to_owned());
        self
    }

    /// Ids of containers actually stopped, in call order.
    #[must_use]
    pub fn stop_calls(&self) -> Vec<String> {
        self.lock().stops.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Grace periods passed to stop, in call order.
    #[must_use]
    pub fn stop_graces(&self) -> Vec<Duration> {
        self.lock().stops.iter().map(|(_, g)| *g).collect()
    }

    /// Current status of `id`.
    #[must_use]
    pub fn status_of(&self, id: &str) -> Option<ContainerStatus> {
        self.lock()
            .containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.status)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reachable(state: &EngineState) -> ToolResult<()> {
        match &state.unreachable {
            Some(reason) => Err(CapabilityError::Unavailable {
                service: "container engine",
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContainerEngine for MockContainerEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list(&self) -> ToolResult<Vec<ContainerRef>> {
        let state = self.lock();
        Self::check_reachable(&state)?;
        Ok(state.containers.clone())
    }

    async fn stop(&self, id: &str, grace: Duration) -> ToolResult<()> {
        let mut state = self.lock();
        Self::check_reachable(&state)?;
        let Some(container) = state
            .containers
            .iter_mut()
            .find(|c| c.id == id || c.name == id)
        else {
            return Err(CapabilityError::NotFound(format!("container {id}")));
        };
        if container.status != ContainerStatus::Running {
            return Ok(());
        }
        container.status = ContainerStatus::Stopped;
        let stopped = container.id.clone();
        state.stops.push((stopped, grace));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let engine = MockContainerEngine::new().with_running("c1", "web", "nginx:1");
        engine.stop("web", Duration::from_secs(3)).await.unwrap();
        engine.stop("c1", Duration::from_secs(3)).await.unwrap();
        assert_eq!(engine.stop_calls(), ["c1"]);
        assert_eq!(engine.status_of("c1"), Some(ContainerStatus::Stopped));
    }

    #[tokio::test]
    async fn test_unreachable() {
        let engine = MockContainerEngine::new().unreachable("socket gone");
        assert!(engine.list().await.is_err());
    }
}
