//! Remote builtins against a local `sshd`. Skipped where none can run.

mod common;

use std::time::{Duration, Instant};

use banai_test::{SshServer, TempTree};
use banai_tools::ErrorKind;
use common::Harness;
use serde_json::json;

fn server() -> Option<SshServer> {
    banai_test::init_test_logging();
    SshServer::start()
}

#[tokio::test]
async fn test_rsh_returns_envelope_and_pools_session() {
    let Some(sshd) = server() else { return };
    let h = Harness::new();

    let r = h
        .ok(
            "rsh",
            vec![sshd.target(), json!("echo out; echo err >&2; exit 3")],
        )
        .await;
    assert_eq!(r, json!({"out": "out\n", "err": "err\n", "status": 3}));
    assert_eq!(h.ctx.ssh_pool().idle(&sshd.address(), sshd.user()), 1);

    let r = h.ok("rsh", vec![sshd.target(), json!("printf again")]).await;
    assert_eq!(r["out"], "again");
    assert_eq!(r["status"], 0);
    assert_eq!(h.ctx.ssh_pool().idle(&sshd.address(), sshd.user()), 1);
}

#[tokio::test]
async fn test_upload_replaces_and_download_round_trips() {
    let Some(sshd) = server() else { return };
    let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    let tree = TempTree::new()
        .with_file("first.bin", b"stale contents")
        .with_file("payload.bin", &payload);
    let h = Harness::with_tree(tree);
    let remote = sshd.scratch().join("remote.bin");
    let remote = json!(remote.display().to_string());

    h.ok("shUpload", vec![sshd.target(), json!("first.bin"), remote.clone()])
        .await;
    h.ok("shUpload", vec![sshd.target(), json!("payload.bin"), remote.clone()])
        .await;
    let leftovers: Vec<String> = std::fs::read_dir(sshd.scratch())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.contains("banai-up"))
        .collect();
    assert!(leftovers.is_empty(), "temp uploads left behind: {leftovers:?}");

    h.ok("shDownload", vec![sshd.target(), remote, json!("back/copy.bin")])
        .await;
    assert_eq!(std::fs::read(h.tree.path().join("back/copy.bin")).unwrap(), payload);

    let missing = json!(sshd.scratch().join("absent.bin").display().to_string());
    let err = h
        .call("shDownload", vec![sshd.target(), missing, json!("absent.bin")])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(h.ctx.ssh_pool().idle(&sshd.address(), sshd.user()), 0);
}

#[tokio::test]
async fn test_remote_timeout_keeps_partial_output_and_drops_session() {
    let Some(sshd) = server() else { return };
    let h = Harness::new();
    let mut target = sshd.target();
    target["timeout"] = json!(2);

    let started = Instant::now();
    let err = h
        .call("rsh", vec![target, json!("echo started; sleep 20; echo never")])
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.partial.unwrap().out, "started\n");
    assert_eq!(h.ctx.ssh_pool().idle(&sshd.address(), sshd.user()), 0);
}
