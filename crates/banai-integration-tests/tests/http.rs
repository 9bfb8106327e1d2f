//! HTTP builtins against a local canned responder.

mod common;

use std::time::Duration;

use banai_test::{CannedResponse, HttpResponder, TempTree};
use banai_tools::ErrorKind;
use common::Harness;
use serde_json::json;

#[tokio::test]
async fn test_get_parses_json_and_sends_headers() {
    let responder = HttpResponder::start(vec![
        CannedResponse::json(200, &json!({"items": [1, 2]})).with_header("X-Trace", "abc"),
    ])
    .await
    .unwrap();
    let h = Harness::new();

    let r = h
        .ok(
            "httpGet",
            vec![
                json!(responder.url("/items?page=2")),
                json!({"header": {"Authorization": "Bearer t"}, "accept": "json"}),
            ],
        )
        .await;
    assert_eq!(r["status"], 200);
    assert_eq!(r["body"], json!({"items": [1, 2]}));
    assert_eq!(r["headers"]["x-trace"], json!(["abc"]));

    let seen = &responder.requests()[0];
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.path, "/items?page=2");
    assert_eq!(seen.header("authorization"), Some("Bearer t"));
    assert_eq!(seen.header("accept"), Some("application/json"));
}

#[tokio::test]
async fn test_error_status_is_data() {
    let responder = HttpResponder::start(vec![CannedResponse::text(503, "busy")])
        .await
        .unwrap();
    let h = Harness::new();
    let r = h
        .ok("httpDelete", vec![json!(responder.url("/thing/7"))])
        .await;
    assert_eq!(r["status"], 503);
    assert_eq!(r["body"], "busy");
    assert_eq!(responder.requests()[0].method, "DELETE");
}

#[tokio::test]
async fn test_put_and_patch_send_bodies() {
    let responder = HttpResponder::start(vec![
        CannedResponse::text(200, "ok"),
        CannedResponse::text(200, "ok"),
    ])
    .await
    .unwrap();
    let h = Harness::new();
    h.ok(
        "httpPut",
        vec![json!(responder.url("/a")), json!({"name": "x"})],
    )
    .await;
    h.ok(
        "httpPatch",
        vec![
            json!(responder.url("/a")),
            json!("raw text"),
            json!({"contentType": "text"}),
        ],
    )
    .await;

    let seen = responder.requests();
    assert_eq!(seen[0].method, "PUT");
    assert_eq!(seen[0].body_text(), r#"{"name":"x"}"#);
    assert_eq!(seen[1].method, "PATCH");
    assert_eq!(seen[1].header("content-type"), Some("text/plain"));
    assert_eq!(seen[1].body_text(), "raw text");
}

#[tokio::test]
async fn test_delete_with_body_head_and_options() {
    let responder = HttpResponder::start(vec![
        CannedResponse::text(200, "gone"),
        CannedResponse::text(200, "").with_header("X-Count", "3"),
        CannedResponse::text(204, "").with_header("Allow", "GET, HEAD"),
    ])
    .await
    .unwrap();
    let h = Harness::new();

    h.ok(
        "httpDelete",
        vec![
            json!(responder.url("/jobs/9")),
            json!({"force": true}),
            json!({"timeout": 5}),
        ],
    )
    .await;
    let r = h.ok("httpHead", vec![json!(responder.url("/jobs"))]).await;
    assert_eq!(r["status"], 200);
    assert_eq!(r["headers"]["x-count"], json!(["3"]));
    let r = h
        .ok(
            "httpOptions",
            vec![json!(responder.url("/jobs")), json!({"accept": "text"})],
        )
        .await;
    assert_eq!(r["status"], 204);
    assert_eq!(r["headers"]["allow"], json!(["GET, HEAD"]));

    let seen = responder.requests();
    assert_eq!(seen[0].method, "DELETE");
    assert_eq!(seen[0].header("content-type"), Some("application/json"));
    assert_eq!(seen[0].body_text(), r#"{"force":true}"#);
    assert_eq!(seen[1].method, "HEAD");
    assert!(seen[1].body.is_empty());
    assert_eq!(seen[2].method, "OPTIONS");
    assert_eq!(seen[2].header("accept"), Some("text/plain"));
}

#[tokio::test]
async fn test_form_with_file_upload() {
    let responder = HttpResponder::start(vec![CannedResponse::text(201, "stored")])
        .await
        .unwrap();
    let h = Harness::with_tree(TempTree::new().with_file("report.csv", "a,b\n1,2\n"));
    let r = h
        .ok(
            "httpPostForm",
            vec![
                json!(responder.url("/upload")),
                json!({"run": 42}),
                json!({"report": "report.csv"}),
            ],
        )
        .await;
    assert_eq!(r["status"], 201);

    let seen = &responder.requests()[0];
    assert!(
        seen.header("content-type")
            .unwrap()
            .starts_with("multipart/form-data; boundary=")
    );
    let body = seen.body_text();
    assert!(body.contains("name=\"run\""));
    assert!(body.contains("42"));
    assert!(body.contains("filename=\"report.csv\""));
    assert!(body.contains("a,b\n1,2\n"));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let responder = HttpResponder::start(vec![
        CannedResponse::text(200, "late").delayed(Duration::from_secs(5)),
    ])
    .await
    .unwrap();
    let h = Harness::new();
    let err = h
        .call(
            "httpGet",
            vec![json!(responder.url("/slow")), json!({"timeout": 1})],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn test_bad_url_and_options() {
    let h = Harness::new();
    let err = h
        .call("httpGet", vec![json!("http://127.0.0.1:1/")])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);

    let err = h
        .call(
            "httpGet",
            vec![json!("http://127.0.0.1:1/"), json!({"retries": 3})],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Config);
}
