mod common;

use std::time::Duration;

use banai_test::{MockContainerEngine, TempTree};
use banai_tools::{ContainerStatus, ErrorKind};
use common::Harness;
use serde_json::json;

fn engine() -> MockContainerEngine {
    MockContainerEngine::new()
        .with_running("4f1c9a", "web", "nginx:1.27")
        .with_container("9b2e77", "migrate", ContainerStatus::Stopped, "app:3")
}

#[tokio::test]
async fn test_list_reports_every_container() {
    let h = Harness::with_engine(TempTree::new(), engine());
    let listed = h.ok("dkrList", vec![]).await;
    assert_eq!(
        listed,
        json!([
            {"id": "4f1c9a", "name": "web", "status": "running", "image": "nginx:1.27"},
            {"id": "9b2e77", "name": "migrate", "status": "stopped", "image": "app:3"},
        ])
    );
}

#[tokio::test]
async fn test_stop_by_name_then_again() {
    let h = Harness::with_engine(TempTree::new(), engine());
    assert_eq!(h.ok("dkrStop", vec![json!("web")]).await, json!(null));
    h.ok("dkrStop", vec![json!("4f1c9a")]).await;
    h.ok("dkrStop", vec![json!("migrate")]).await;

    assert_eq!(h.engine.stop_calls(), ["4f1c9a"]);
    assert_eq!(h.engine.stop_graces(), [Duration::from_secs(10)]);
    assert_eq!(h.engine.status_of("4f1c9a"), Some(ContainerStatus::Stopped));

    let listed = h.ok("dkrList", vec![]).await;
    assert_eq!(listed[0]["status"], "stopped");
}

#[tokio::test]
async fn test_unknown_container_and_down_engine() {
    let h = Harness::with_engine(TempTree::new(), engine());
    let err = h.call("dkrStop", vec![json!("ghost")]).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let down = Harness::with_engine(TempTree::new(), engine().unreachable("socket refused"));
    for (name, args) in [("dkrList", vec![]), ("dkrStop", vec![json!("web")])] {
        let err = down.call(name, args).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unavailable);
    }
}
