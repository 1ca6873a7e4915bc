use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use cityscape_import::adapter::handler::{self, AppState};
use cityscape_import::adapter::repository::{InMemoryCityStore, InMemoryImportRecordRepository};
use cityscape_import::infrastructure::memory_storage::InMemoryObjectStorage;
use cityscape_import::usecase::{ImportBatchUseCase, ListImportsUseCase};

fn make_app() -> (Router, Arc<InMemoryCityStore>, Arc<InMemoryObjectStorage>) {
    let import_repo = Arc::new(InMemoryImportRecordRepository::new());
    let city_store = Arc::new(InMemoryCityStore::new());
    let storage = Arc::new(InMemoryObjectStorage::new());

    let import_batch_uc = Arc::new(ImportBatchUseCase::new(
        import_repo.clone(),
        city_store.clone(),
        storage.clone(),
    ));
    let list_imports_uc = Arc::new(ListImportsUseCase::new(import_repo, storage.clone(), 900));

    let app = handler::router(AppState {
        import_batch_uc,
        list_imports_uc,
    });
    (app, city_store, storage)
}

fn import_request(user: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/imports")
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let (app, _, _) = make_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_import_requires_user_header() {
    let (app, _, storage) = make_app();

    let response = app
        .oneshot(import_request(None, r#"[{"name": "A"}]"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "IMPORT_VALIDATION_ERROR");
    // バリデーションで弾かれた場合は何もステージングされない
    assert_eq!(storage.object_count().await, 0);
}

#[tokio::test]
async fn test_import_rejects_empty_body() {
    let (app, _, storage) = make_app();

    let response = app
        .oneshot(import_request(Some("operator"), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "IMPORT_VALIDATION_ERROR");
    assert_eq!(storage.object_count().await, 0);
}

#[tokio::test]
async fn test_successful_import() {
    let (app, city_store, storage) = make_app();

    let response = app
        .oneshot(import_request(
            Some("operator"),
            r#"[{"name": "Springfield", "capital": true}, {"name": "Shelbyville"}]"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "SUCCESS");
    assert_eq!(body["objects_added"], 2);
    assert_eq!(body["submitted_by"], "operator");
    assert!(body["error_message"].is_null());

    assert_eq!(city_store.committed_cities().await.len(), 2);
    // 最終キーのみが残り、一時キーは消えている
    assert_eq!(storage.object_count().await, 1);
}

#[tokio::test]
async fn test_duplicate_import_fails_atomically() {
    let (app, city_store, storage) = make_app();

    let response = app
        .oneshot(import_request(
            Some("operator"),
            r#"[{"name": "Springfield"}, {"name": "Springfield"}]"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "FAILURE");
    assert_eq!(body["objects_added"], 0);
    assert!(body["error_message"]
        .as_str()
        .unwrap()
        .contains("already exists"));

    assert!(city_store.committed_cities().await.is_empty());
    assert_eq!(storage.object_count().await, 0);
}

#[tokio::test]
async fn test_malformed_document_is_recorded_as_failure() {
    let (app, _, storage) = make_app();

    let response = app
        .oneshot(import_request(Some("operator"), "not json at all"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "FAILURE");
    assert!(body["error_message"]
        .as_str()
        .unwrap()
        .contains("invalid import document"));
    assert_eq!(storage.object_count().await, 0);
}

#[tokio::test]
async fn test_history_presigns_only_successful_imports() {
    let (app, _, _) = make_app();

    let response = app
        .clone()
        .oneshot(import_request(Some("operator"), r#"[{"name": "A"}]"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(import_request(Some("operator"), r#"[{"name": "A"}]"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/imports/history")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let imports = body["imports"].as_array().unwrap();
    assert_eq!(imports.len(), 2);

    // 新しい順: 先頭は重複で失敗した2回目のインポート
    assert_eq!(imports[0]["status"], "FAILURE");
    assert!(imports[0]["file_download_url"].is_null());
    assert_eq!(imports[1]["status"], "SUCCESS");
    assert!(imports[1]["file_download_url"]
        .as_str()
        .unwrap()
        .contains("download"));
}
