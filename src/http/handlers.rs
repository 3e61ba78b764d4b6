//! Request handlers.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::http::response::ApiError;
use crate::store::{Record, StoreSlot};

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: StoreSlot,
}

#[derive(Debug, Serialize)]
pub struct CreateRecordResponse {
    pub message: &'static str,
}

/// Route table served by the runtime.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/records", post(create_record))
        .route("/health", get(health))
        .with_state(state)
}

/// Insert one record into the store.
async fn create_record(
    State(state): State<AppState>,
    Json(record): Json<Record>,
) -> Result<Json<CreateRecordResponse>, ApiError> {
    let store = state.store.get().map_err(ApiError::CreateRecord)?;

    if let Err(e) = store.insert(&record).await {
        tracing::warn!(key = %record.a, error = %e, "Failed to create record");
        return Err(ApiError::CreateRecord(e));
    }

    tracing::debug!(key = %record.a, "Record created");
    Ok(Json(CreateRecordResponse { message: "success" }))
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn post_record(body: &str) -> Request<Body> {
        Request::post("/records")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_record_persists() {
        let store = Arc::new(MemoryStore::new());
        let app = routes(AppState {
            store: StoreSlot::with_store(store.clone()),
        });

        let response = app.oneshot(post_record(r#"{"a":"alpha","b":3}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "success");
        assert_eq!(store.get("alpha").unwrap().b, 3);
    }

    #[tokio::test]
    async fn duplicate_record_is_internal_error() {
        let store = Arc::new(MemoryStore::new());
        let app = routes(AppState {
            store: StoreSlot::with_store(store),
        });

        let first = app.clone().oneshot(post_record(r#"{"a":"k","b":1}"#)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(post_record(r#"{"a":"k","b":2}"#)).await.unwrap();
        assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(second).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("failed to create record"));
    }

    #[tokio::test]
    async fn unfilled_slot_fails_request_only() {
        let app = routes(AppState {
            store: StoreSlot::new(),
        });

        let response = app.clone().oneshot(post_record(r#"{"a":"k","b":1}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let health = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let app = routes(AppState {
            store: StoreSlot::with_store(Arc::new(MemoryStore::new())),
        });

        let response = app.oneshot(post_record(r#"{"a":1}"#)).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
