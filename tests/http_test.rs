mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{Factory, TestApp};
use http_workbench::entity::Role;
use http_workbench::models::KeyValueKind;
use http_workbench::repositories::{self, HttpRepository, Repository};

#[tokio::test]
async fn test_insert_and_list_requests() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let id = Uuid::now_v7();

    let response = app
        .server
        .post("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "items": [{
                "id": id,
                "workspace_id": workspace.id,
                "name": "List users",
                "url": "https://example.com/users",
                "body_kind": "none"
            }]
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let row = &body["data"][0];
    assert_eq!(row["id"], id.to_string());
    assert_eq!(row["method"], "GET");
    assert_eq!(row["is_delta"], false);
    assert_eq!(row["is_snapshot"], false);

    let response = app
        .server
        .get("/api/http")
        .add_header("Authorization", auth.auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["name"], "List users");
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;

    let response = app
        .server
        .post("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [] }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_id_is_rejected() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;

    let response = app
        .server
        .post("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "items": [{ "id": "nope", "workspace_id": workspace.id, "name": "x" }]
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_id_is_failed_precondition() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let existing = factory
        .create_http(&auth, workspace.id, "GET", "https://example.com")
        .await;

    let response = app
        .server
        .post("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "items": [{ "id": existing.id, "workspace_id": workspace.id, "name": "again" }]
        }))
        .await;

    response.assert_status(StatusCode::PRECONDITION_FAILED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "failed_precondition");
}

#[tokio::test]
async fn test_update_patches_only_given_fields() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", "https://example.com/a")
        .await;

    let response = app
        .server
        .patch("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "items": [{ "id": http.id, "url": "https://example.com/b", "method": "put" }]
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"][0]["url"], "https://example.com/b");
    assert_eq!(body["data"][0]["method"], "PUT");
    assert_eq!(body["data"][0]["name"], http.name);
}

#[tokio::test]
async fn test_delta_fields_on_base_are_rejected() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", "https://example.com")
        .await;

    let response = app
        .server
        .patch("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": http.id, "delta_url": "https://x" }] }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_roles_gate_writes_and_deletes() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let owner = factory.create_user().await;
    let admin = factory.create_user().await;
    let member = factory.create_user().await;
    let outsider = factory.create_user().await;
    let workspace = factory.create_workspace(&owner).await;
    factory.add_member(&owner, workspace.id, &admin, Role::Admin).await;
    factory.add_member(&owner, workspace.id, &member, Role::Member).await;
    let http = factory
        .create_http(&owner, workspace.id, "GET", "https://example.com")
        .await;

    let patch = json!({ "items": [{ "id": http.id, "name": "renamed" }] });
    let delete = json!({ "items": [{ "id": http.id }] });

    let response = app
        .server
        .patch("/api/http")
        .add_header("Authorization", member.auth_header())
        .json(&patch)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .patch("/api/http")
        .add_header("Authorization", outsider.auth_header())
        .json(&patch)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = app
        .server
        .patch("/api/http")
        .add_header("Authorization", admin.auth_header())
        .json(&patch)
        .await;
    response.assert_status_ok();

    let response = app
        .server
        .post("/api/http/delete")
        .add_header("Authorization", admin.auth_header())
        .json(&delete)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .post("/api/http/delete")
        .add_header("Authorization", owner.auth_header())
        .json(&delete)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["deleted"][0], http.id.to_string());

    // Members still see the (now empty) collection
    let response = app
        .server
        .get("/api/http")
        .add_header("Authorization", member.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delta_parent_must_be_base_in_same_workspace() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let other = factory.create_workspace(&auth).await;
    let base = factory
        .create_http(&auth, workspace.id, "GET", "https://example.com")
        .await;
    let delta = factory.create_delta(&auth, &base, None).await;
    assert!(delta.is_delta);

    // Delta of a delta
    let response = app
        .server
        .post("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "items": [{
                "id": Uuid::now_v7(),
                "workspace_id": workspace.id,
                "name": "nested",
                "parent_http_id": delta.id
            }]
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Delta in another workspace
    let response = app
        .server
        .post("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "items": [{
                "id": Uuid::now_v7(),
                "workspace_id": other.id,
                "name": "elsewhere",
                "parent_http_id": base.id
            }]
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Unknown parent
    let response = app
        .server
        .post("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({
            "items": [{
                "id": Uuid::now_v7(),
                "workspace_id": workspace.id,
                "name": "orphan",
                "parent_http_id": Uuid::now_v7()
            }]
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleting_base_with_deltas_fails() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let base = factory
        .create_http(&auth, workspace.id, "GET", "https://example.com")
        .await;
    let delta = factory.create_delta(&auth, &base, None).await;

    let response = app
        .server
        .post("/api/http/delete")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": base.id }] }))
        .await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);

    // Removing both in one batch is fine
    let response = app
        .server
        .post("/api/http/delete")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": base.id }, { "id": delta.id }] }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_duplicate_copies_children_under_fresh_ids() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", "https://example.com")
        .await;
    let header = factory
        .add_key_value(&auth, &http, KeyValueKind::Header, "Accept", "application/json", 1.0)
        .await;
    factory.add_assert(&auth, &http, "status == 200", 1.0).await;

    let response = app
        .server
        .post(&format!("/api/http/{}/duplicate", http.id))
        .add_header("Authorization", auth.auth_header())
        .await;

    response.assert_status_ok();
    let copy: serde_json::Value = response.json();
    assert_eq!(copy["name"], format!("Copy of {}", http.name));
    assert_ne!(copy["id"], http.id.to_string());
    let copy_id = copy["id"].as_str().unwrap().to_string();

    let response = app
        .server
        .get("/api/http/headers")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    let headers = body["data"].as_array().unwrap();
    assert_eq!(headers.len(), 2);
    let copied = headers
        .iter()
        .find(|h| h["http_id"] == copy_id)
        .expect("copied header");
    assert_eq!(copied["key"], "Accept");
    assert_ne!(copied["id"], header.id.to_string());

    let response = app
        .server
        .get("/api/http/asserts")
        .add_header("Authorization", auth.auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_duplicate_of_delta_is_resolved_base() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let base = factory
        .create_http(&auth, workspace.id, "GET", "https://example.com/base")
        .await;
    let delta = factory
        .create_delta(&auth, &base, Some("https://example.com/delta"))
        .await;

    let response = app
        .server
        .post(&format!("/api/http/{}/duplicate", delta.id))
        .add_header("Authorization", auth.auth_header())
        .await;

    response.assert_status_ok();
    let copy: serde_json::Value = response.json();
    assert_eq!(copy["url"], "https://example.com/delta");
    assert_eq!(copy["is_delta"], false);
    assert!(copy["parent_http_id"].is_null());
    assert!(copy["delta_url"].is_null());
}

#[tokio::test]
async fn test_stale_update_keeps_newer_run_time() {
    let app = TestApp::new().await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let workspace = factory.create_workspace(&auth).await;
    let http = factory
        .create_http(&auth, workspace.id, "GET", "https://example.com")
        .await;
    let db = &app.state.db;

    // Read before a run lands, write after it
    let mut stale = HttpRepository::find_by_id(db, http.id).await.unwrap();
    assert!(stale.last_run_at.is_none());

    let txn = repositories::begin(db).await.unwrap();
    HttpRepository::tx(&txn)
        .touch_last_run(http.id, 1_700_000_000)
        .await
        .unwrap();
    repositories::commit(txn).await.unwrap();

    stale.name = "renamed".to_string();
    let txn = repositories::begin(db).await.unwrap();
    HttpRepository::tx(&txn).update(&stale).await.unwrap();
    repositories::commit(txn).await.unwrap();

    let current = HttpRepository::find_by_id(db, http.id).await.unwrap();
    assert_eq!(current.name, "renamed");
    assert_eq!(current.last_run_at, Some(1_700_000_000));
    assert_eq!(current.created_at, http.created_at);

    // The patch response reports the stored run time too
    let response = app
        .server
        .patch("/api/http")
        .add_header("Authorization", auth.auth_header())
        .json(&json!({ "items": [{ "id": http.id, "description": "d" }] }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"][0]["last_run_at"], 1_700_000_000);
}
