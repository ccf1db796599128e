//! Shared helpers for gem-service integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use gem_service::services::{GemDb, GemStore, InMemoryGemStore};
use gem_service::{build_router, AppState, Application};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const UNKNOWN_ID: &str = "65a1b2c3d4e5f60718293a4b";

/// Router over a fresh in-memory store, with the store handle for inspection.
pub fn test_router() -> (Router, Arc<InMemoryGemStore>) {
    let store = Arc::new(InMemoryGemStore::new());
    let shared: Arc<dyn GemStore> = store.clone();
    (build_router(AppState::new(shared)), store)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text)
            .unwrap_or_else(|e| panic!("response is not JSON ({}): {}", e, self.text))
    }
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).expect("Failed to build request"))
        .await
        .expect("Failed to execute request");

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();

    TestResponse {
        status,
        headers,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

/// A running server on a random port.
pub struct TestApp {
    pub address: String,
    pub port: u16,
}

impl TestApp {
    pub async fn spawn(store: Arc<dyn GemStore>) -> Self {
        let app = Application::with_store(0, store)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept connections
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client.get(&address).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp { address, port }
    }
}

/// Connect to the MongoDB named by `MONGODB_URI` (default localhost) using a
/// throwaway database. Drop it with [`drop_database`] when done.
pub async fn mongo_store() -> (GemDb, String) {
    dotenvy::dotenv().ok();
    let uri = std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = format!(
        "gem_test_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos()
    );
    let db = GemDb::connect(&uri, &db_name)
        .await
        .expect("Failed to connect to MongoDB");
    (db, db_name)
}

pub async fn drop_database(db: &GemDb) {
    let _ = db.database().drop(None).await;
}
