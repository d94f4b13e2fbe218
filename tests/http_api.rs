//! End-to-end HTTP tests over the in-memory adapter: envelope shape,
//! status codes, pagination flags, and batch accounting.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use crudcraft::{
    app_router, AppState, EntityDefinition, MemoryAdapter, PageDefaults, RegistryBuilder,
    StorageBackends,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn users_definition() -> EntityDefinition {
    serde_json::from_value(json!({
        "name": "users",
        "collection": "users",
        "id_strategy": "document",
        "fields": [
            {"name": "id"},
            {"name": "name"},
            {"name": "email"},
            {"name": "created_at"},
            {"name": "updated_at"}
        ],
        "unique": [{"fields": ["email"], "message": "email already registered"}],
        "audit": {"created_at": "created_at", "updated_at": "updated_at"}
    }))
    .unwrap()
}

fn app() -> Router {
    app_with_chunk_size(1000)
}

fn app_with_chunk_size(chunk_size: usize) -> Router {
    let registry = RegistryBuilder::new(StorageBackends::default())
        .chunk_size(chunk_size)
        .register_with_adapter(users_definition(), Arc::new(MemoryAdapter::new()))
        .unwrap()
        .build();
    let state = AppState::with_defaults(
        Arc::new(registry),
        PageDefaults {
            page_size: 20,
            max_page_size: 100,
        },
    );
    app_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(v) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn create_returns_201_envelope_with_generated_id_and_stamps() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"name": "Ada", "email": "ada@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["statusCode"], 201);
    assert_eq!(body["status"], "CREATED");
    assert!(body["data"]["id"].is_string());
    assert_eq!(body["data"]["created_at"], body["data"]["updated_at"]);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn duplicate_create_returns_409_with_violation_details() {
    let app = app();
    send(&app, "POST", "/users", Some(json!({"email": "a@x.com"}))).await;
    let (status, body) = send(&app, "POST", "/users", Some(json!({"email": "a@x.com"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "unique_violation");
    assert_eq!(body["error"]["details"][0]["fields"][0], "email");
    assert_eq!(
        body["error"]["details"][0]["message"],
        "email already registered"
    );
}

#[tokio::test]
async fn read_update_delete_lifecycle() {
    let app = app();
    let (_, created) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"name": "Ada", "email": "ada@x.com"})),
    )
    .await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ada");

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/users/{id}"),
        Some(json!({"name": "Lovelace"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Lovelace");
    assert_eq!(body["data"]["email"], "ada@x.com");

    let (status, body) = send(&app, "DELETE", &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"].is_null());

    let (status, body) = send(&app, "GET", &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], "NOT_FOUND");
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn unknown_entity_is_404() {
    let app = app();
    let (status, body) = send(&app, "GET", "/widgets", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn page_returns_flags_and_totals() {
    let app = app();
    for i in 0..25 {
        send(
            &app,
            "POST",
            "/users",
            Some(json!({"name": format!("u{i}"), "email": format!("{i}@x.com")})),
        )
        .await;
    }

    let (status, body) = send(&app, "GET", "/users/page?page=0&size=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"];
    assert_eq!(page["content"].as_array().unwrap().len(), 10);
    assert_eq!(page["totalElements"], 25);
    assert_eq!(page["totalPages"], 3);
    assert_eq!(page["first"], true);
    assert_eq!(page["last"], false);

    let (_, body) = send(&app, "GET", "/users/page?page=2&size=10", None).await;
    let page = &body["data"];
    assert_eq!(page["content"].as_array().unwrap().len(), 5);
    assert_eq!(page["first"], false);
    assert_eq!(page["last"], true);
}

#[tokio::test]
async fn page_size_is_capped_at_configured_maximum() {
    let app = app();
    send(&app, "POST", "/users", Some(json!({"email": "a@x.com"}))).await;
    let (status, body) = send(&app, "GET", "/users/page?size=100000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pageSize"], 100);
}

#[tokio::test]
async fn page_number_past_u64_range_is_rejected() {
    let app = app();
    send(&app, "POST", "/users", Some(json!({"email": "a@x.com"}))).await;
    let (status, body) = send(
        &app,
        "GET",
        "/users/page?page=18446744073709551615&size=2",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn list_sorts_by_requested_field() {
    let app = app();
    for name in ["carol", "alice", "bob"] {
        send(
            &app,
            "POST",
            "/users",
            Some(json!({"name": name, "email": format!("{name}@x.com")})),
        )
        .await;
    }
    let (status, body) = send(
        &app,
        "GET",
        "/users?sortBy=name&sortDirection=DESC",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["carol", "bob", "alice"]);
}

#[tokio::test]
async fn invalid_sort_direction_is_400() {
    let app = app();
    let (status, body) = send(&app, "GET", "/users?sortBy=name&sortDirection=sideways", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn count_and_exists_endpoints() {
    let app = app();
    let (_, created) = send(&app, "POST", "/users", Some(json!({"email": "a@x.com"}))).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/users/count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);

    let (_, body) = send(&app, "GET", &format!("/users/{id}/exists"), None).await;
    assert_eq!(body["data"]["exists"], true);

    let (_, body) = send(&app, "GET", "/users/missing/exists", None).await;
    assert_eq!(body["data"]["exists"], false);
}

#[tokio::test]
async fn batch_reports_chunked_partial_failure() {
    // chunk size 2: [ok, ok], [ok, dup], [ok]
    let app = app_with_chunk_size(2);
    let items = json!([
        {"email": "0@x.com"},
        {"email": "1@x.com"},
        {"email": "2@x.com"},
        {"email": "0@x.com"},
        {"email": "4@x.com"}
    ]);
    let (status, body) = send(&app, "POST", "/users/batch", Some(items)).await;
    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["total"], 5);
    assert_eq!(report["succeeded"], 3);
    assert_eq!(report["failed"], 2);
    assert_eq!(report["failures"][0]["chunkIndex"], 1);
    assert_eq!(report["failures"][0]["offset"], 2);
    assert_eq!(report["failures"][0]["size"], 2);
    assert_eq!(report["failures"][0]["entities"].as_array().unwrap().len(), 2);
    assert_eq!(report["failures"][0]["entities"][1]["email"], "0@x.com");

    let (_, body) = send(&app, "GET", "/users/count", None).await;
    assert_eq!(body["data"]["count"], 3);
}

#[tokio::test]
async fn batch_with_non_array_body_is_400() {
    let app = app();
    let (status, body) = send(&app, "POST", "/users/batch", Some(json!({"email": "a"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn health_and_version_routes() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "crudcraft");
}
