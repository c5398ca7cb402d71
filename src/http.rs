//! HTTP surface: the same request envelope over `POST /api`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::api::{self, err, AppState, Request};
use crate::util::generate_request_id;

pub type SharedState = Arc<Mutex<AppState>>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api", post(api_handler))
        .route("/", post(api_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<SharedState>) -> Json<Value> {
    let guard = state.lock();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "workspaceOpen": guard.store.is_some(),
    }))
}

async fn api_handler(State(state): State<SharedState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let req: Request = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            let resp = err(&generate_request_id(), "BAD_REQUEST", format!("invalid request: {e}"), None);
            return (StatusCode::BAD_REQUEST, Json(resp));
        }
    };

    let joined = tokio::task::spawn_blocking(move || {
        let mut guard = state.lock();
        api::handle_request(&mut guard, req)
    })
    .await;
    match joined {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => {
            tracing::error!(error = %e, "request task failed");
            let resp = err(&generate_request_id(), "INTERNAL", "internal error", None);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(resp))
        }
    }
}

pub async fn serve(state: SharedState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn app() -> Router {
        let mut state = AppState::new(false);
        state.store = Some(Store::in_memory().expect("store"));
        router(Arc::new(Mutex::new(state)))
    }

    async fn post_json(app: Router, body: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                HttpRequest::post("/api")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn login_over_http_returns_envelope() {
        let (status, body) = post_json(
            app(),
            r#"{"action":"login","requestId":"r1","email":"admin@demo.com","password":"1234"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requestId"], "r1");
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["role"], "admin");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let (status, body) = post_json(app(), "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorCode"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn http_does_not_remember_tokens() {
        let app = app();
        let (_, login) = post_json(
            app.clone(),
            r#"{"action":"login","email":"teacher@demo.com","password":"1234"}"#,
        )
        .await;
        assert_eq!(login["success"], true);
        let (_, me) = post_json(app, r#"{"action":"me"}"#).await;
        assert_eq!(me["errorCode"], "UNAUTHORIZED");
    }
}
