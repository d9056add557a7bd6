mod common;

use std::time::Duration;

use axum::http::StatusCode;
use sea_orm::ConnectionTrait;
use serde_json::json;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use common::{EchoServer, Factory, TestApp};
use http_workbench::entity::Role;
use http_workbench::events::SyncEvent;
use http_workbench::models::{KeyValueKind, RunOptions};
use http_workbench::services::RunEngine;

/// The echo server's view of the request a run sent
fn echoed(run: &serde_json::Value) -> serde_json::Value {
    serde_json::from_str(run["response"]["body"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_run_stores_response_asserts_and_version() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let url = echo.url("/things");
    let http = factory.create_http(&auth, workspace.id, "GET", &url).await;
    factory
        .add_key_value(&auth, &http, KeyValueKind::SearchParam, "q", "rust", 1.0)
        .await;
    factory
        .add_key_value(&auth, &http, KeyValueKind::Header, "X-Token", "abc", 1.0)
        .await;
    factory.add_assert(&auth, &http, "status == 200", 1.0).await;
    factory
        .add_assert(&auth, &http, "json.path('query') == 'q=rust'", 2.0)
        .await;
    factory
        .add_assert(&auth, &http, "json.headers['x-token'] == 'abc'", 3.0)
        .await;
    factory.add_assert(&auth, &http, "status == 404", 4.0).await;
    factory.add_assert(&auth, &http, "json.number('missing')", 5.0).await;

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["response"]["status"], 200);
    assert_eq!(body["response"]["http_id"], http.id.to_string());

    let outcomes: Vec<bool> = body["asserts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["success"].as_bool().unwrap())
        .collect();
    assert_eq!(outcomes, vec![true, true, true, false, false]);
    assert_eq!(body["asserts"][3]["value"], "status == 404");
    assert!(body["asserts"][4]["value"]
        .as_str()
        .unwrap()
        .starts_with("ERROR: "));

    assert_eq!(body["version"]["http_id"], http.id.to_string());
    assert_eq!(body["version"]["name"], format!("GET {}", url));
    assert_eq!(body["version"]["author_user_id"], auth.user_id.to_string());

    // Snapshots stay out of the request collection
    let response = app
        .server
        .get("/api/http")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0]["last_run_at"].as_i64().is_some());

    // ...but their children and the duplicated response are visible
    let response = app
        .server
        .get("/api/http/headers")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = app
        .server
        .get("/api/http/responses")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = app
        .server
        .get("/api/http/response-asserts")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 5);

    let response = app
        .server
        .get("/api/http/versions")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_substitutes_variables_and_keeps_templates() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    factory
        .set_variable(&auth, workspace.id, "base", &echo.base_url)
        .await;
    factory.set_variable(&auth, workspace.id, "token", "t0k").await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", "{{ base }}/vars")
        .await;
    factory
        .add_key_value(
            &auth,
            &http,
            KeyValueKind::Header,
            "Authorization",
            "Bearer {{token}}",
            1.0,
        )
        .await;
    factory
        .add_assert(&auth, &http, "json.headers.authorization == 'Bearer t0k'", 1.0)
        .await;
    factory
        .add_assert(&auth, &http, "json.path == '/vars'", 2.0)
        .await;

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "version_name": "smoke", "version_description": "first" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["asserts"][0]["success"], true);
    assert_eq!(body["asserts"][1]["success"], true);
    assert_eq!(body["version"]["name"], "smoke");
    assert_eq!(body["version"]["description"], "first");

    // The snapshot header keeps the template, not the secret
    let response = app
        .server
        .get("/api/http/headers")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    let headers = body["data"].as_array().unwrap();
    assert_eq!(headers.len(), 2);
    assert!(headers.iter().all(|h| h["value"] == "Bearer {{token}}"));
}

#[tokio::test]
async fn test_undefined_variable_aborts_run() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", "{{ nowhere }}/x")
        .await;

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["details"].as_str().unwrap().contains("nowhere"));

    let response = app
        .server
        .get("/api/http/responses")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_target_is_unavailable() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", "http://127.0.0.1:1/")
        .await;

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let response = app
        .server
        .get("/api/http/versions")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_sends_raw_json_body() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "POST", &echo.url("/items"))
        .await;
    // {"a":1}
    factory.set_body_raw(&auth, &http, "eyJhIjoxfQ==").await;
    factory
        .add_assert(
            &auth,
            &http,
            "json.headers['content-type'] == 'application/json'",
            1.0,
        )
        .await;
    factory
        .add_assert(&auth, &http, "json.body == '{\"a\":1}' && json.method == 'POST'", 2.0)
        .await;

    app.server
        .patch("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": http.id, "body_kind": "raw" }] }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["asserts"][0]["success"], true);
    assert_eq!(body["asserts"][1]["success"], true);
}

#[tokio::test]
async fn test_run_sends_urlencoded_form() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "POST", &echo.url("/form"))
        .await;
    factory
        .add_key_value(&auth, &http, KeyValueKind::BodyUrlEncoded, "name", "a b", 1.0)
        .await;
    factory
        .add_key_value(&auth, &http, KeyValueKind::BodyUrlEncoded, "tag", "x&y", 2.0)
        .await;
    factory
        .add_assert(&auth, &http, "json.body == 'name=a+b&tag=x%26y'", 1.0)
        .await;
    factory
        .add_assert(
            &auth,
            &http,
            "json.headers['content-type'] == 'application/x-www-form-urlencoded'",
            2.0,
        )
        .await;

    app.server
        .patch("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": http.id, "body_kind": "url_encoded" }] }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["asserts"][0]["success"], true);
    assert_eq!(body["asserts"][1]["success"], true);
}

#[tokio::test]
async fn test_binary_response_renders_placeholder() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", &echo.url("/binary"))
        .await;

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["response"]["body"], "[Binary data: 4 bytes]");
    assert_eq!(body["response"]["size"], 4);
}

#[tokio::test]
async fn test_error_status_still_records_version() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", &echo.url("/status/503"))
        .await;
    factory.add_assert(&auth, &http, "server_error", 1.0).await;

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["response"]["status"], 503);
    assert_eq!(body["asserts"][0]["success"], true);
}

#[tokio::test]
async fn test_snapshots_are_read_only() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", &echo.url("/a"))
        .await;

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;
    let body: serde_json::Value = response.json();
    let snapshot_id = body["version"]["id"].as_str().unwrap().to_string();

    let response = app
        .server
        .post(&format!("/api/http/{}/run", snapshot_id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);

    let response = app
        .server
        .patch("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": snapshot_id, "name": "tampered" }] }))
        .await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);

    let response = app
        .server
        .post("/api/http/headers")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "items": [{ "id": uuid::Uuid::now_v7(), "http_id": snapshot_id, "key": "X" }]
        }))
        .await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_members_can_run() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let owner = factory.create_user().await;
    let member = factory.create_user().await;
    let outsider = factory.create_user().await;
    let workspace = factory.create_workspace(&owner).await;
    factory
        .add_member(&owner, workspace.id, &member, Role::Member)
        .await;
    let http = factory
        .create_http(&owner, workspace.id, "GET", &echo.url("/m"))
        .await;

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", member.auth_header())
        .json(&json!({}))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["version"]["author_user_id"], member.user_id.to_string());

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", outsider.auth_header())
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_runs_each_produce_a_version() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", &echo.url("/concurrent"))
        .await;
    factory.add_assert(&auth, &http, "status == 200", 1.0).await;
    let mut versions = app
        .state
        .streams
        .version
        .subscribe(|_| async { true })
        .unwrap();

    let engine = RunEngine::new(&app.state);
    let runs = (0..5).map(|_| {
        engine.run(
            auth.user_id,
            http.id,
            RunOptions::default(),
            CancellationToken::new(),
        )
    });
    let results = futures::future::join_all(runs).await;

    let mut version_ids: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().version.id)
        .collect();
    version_ids.sort();
    version_ids.dedup();
    assert_eq!(version_ids.len(), 5);

    let mut published = Vec::new();
    for _ in 0..5 {
        match timeout(Duration::from_secs(5), versions.recv()).await {
            Ok(Some(SyncEvent::Insert { value })) => published.push(value.id),
            other => panic!("expected version insert, got {:?}", other),
        }
    }
    published.sort();
    assert_eq!(published, version_ids);
    assert!(timeout(Duration::from_millis(200), versions.recv()).await.is_err());

    let response = app
        .server
        .get("/api/http/versions")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", &echo.url("/never"))
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = RunEngine::new(&app.state)
        .run(auth.user_id, http.id, RunOptions::default(), cancel)
        .await
        .unwrap_err();
    assert_eq!(err.code(), http_workbench::error::ErrorCode::Canceled);

    let response = app
        .server
        .get("/api/http/responses")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_request_removes_history() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", &echo.url("/gone"))
        .await;
    factory
        .add_key_value(&auth, &http, KeyValueKind::Header, "X-A", "1", 1.0)
        .await;

    app.server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await
        .assert_status_ok();

    app.server
        .post("/api/http/delete")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": http.id }] }))
        .await
        .assert_status_ok();

    for path in [
        "/api/http/versions",
        "/api/http/responses",
        "/api/http/response-headers",
        "/api/http/headers",
    ] {
        let response = app
            .server
            .get(path)
            .add_header("Authorization", auth.auth_header())
            .await;
        let body: serde_json::Value = response.json();
        assert!(body["data"].as_array().unwrap().is_empty(), "{}", path);
    }
}

#[tokio::test]
async fn test_disabled_rows_are_not_substituted() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", &echo.url("/disabled"))
        .await;
    let header = factory
        .add_key_value(&auth, &http, KeyValueKind::Header, "X-Old", "{{ gone }}", 1.0)
        .await;
    factory
        .add_key_value(&auth, &http, KeyValueKind::BodyForm, "unused", "{{ gone }}", 1.0)
        .await;
    app.server
        .patch("/api/http/headers")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": header.id, "enabled": false }] }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(echoed(&body)["headers"].get("x-old").is_none());
}

#[tokio::test]
async fn test_run_sends_multipart_form() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "POST", &echo.url("/upload"))
        .await;
    factory
        .add_key_value(&auth, &http, KeyValueKind::BodyForm, "name", "widget", 1.0)
        .await;
    factory
        .add_key_value(&auth, &http, KeyValueKind::BodyForm, "size", "3", 2.0)
        .await;
    let hidden = factory
        .add_key_value(&auth, &http, KeyValueKind::BodyForm, "hidden", "x", 3.0)
        .await;

    app.server
        .patch("/api/http/body-form")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": hidden.id, "enabled": false }] }))
        .await
        .assert_status_ok();
    app.server
        .patch("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": http.id, "body_kind": "form_data" }] }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .post(&format!("/api/http/{}/run", http.id))
        .add_header("Authorization", auth.auth_header())
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let sent = echoed(&response.json());
    let content_type = sent["headers"]["content-type"].as_str().unwrap();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .unwrap();
    assert!(!boundary.is_empty());

    let form = sent["body"].as_str().unwrap();
    assert_eq!(form.matches("Content-Disposition: form-data;").count(), 2);
    assert!(form.contains("name=\"name\"\r\n\r\nwidget\r\n"));
    assert!(form.contains("name=\"size\"\r\n\r\n3\r\n"));
    assert!(!form.contains("hidden"));
    assert!(form.ends_with(&format!("--{}--\r\n", boundary)));
}

#[tokio::test]
async fn test_assert_storage_failure_still_records_version() {
    let echo = EchoServer::start().await;
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", &echo.url("/broken"))
        .await;
    factory.add_assert(&auth, &http, "status == 200", 1.0).await;

    app.state
        .db
        .execute_unprepared("DROP TABLE http_response_assert")
        .await
        .unwrap();

    let result = RunEngine::new(&app.state)
        .run(
            auth.user_id,
            http.id,
            RunOptions::default(),
            CancellationToken::new(),
        )
        .await;
    assert!(result.is_err());

    let response = app
        .server
        .get("/api/http/versions")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    let versions = body["data"].as_array().unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0]["http_id"], http.id.to_string());

    let response = app
        .server
        .get("/api/http/responses")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}
