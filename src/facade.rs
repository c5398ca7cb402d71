//! Client-side entry point: sends an action either to the in-process router
//! (demo mode) or to a remote backend (api mode), and keeps the signed-in
//! session in the local store.

use chrono::Utc;
use serde_json::{json, Value};

use crate::api::{self, err, Request};
use crate::http::SharedState;
use crate::models::{ClientSession, Mode};
use crate::util::{generate_request_id, parse_timestamp};

const NOT_CONFIGURED: &str = "NOT_CONFIGURED";
const NETWORK_ERROR: &str = "NETWORK_ERROR";

pub struct Api {
    state: SharedState,
    base_url: Option<String>,
    client: reqwest::Client,
}

impl Api {
    pub fn new(state: SharedState, base_url: Option<String>) -> Api {
        Api {
            state,
            base_url: base_url.filter(|u| !u.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }

    /// Mode and live session token from the local store. Expired sessions
    /// are dropped here.
    fn local_context(&self) -> (Mode, Option<String>) {
        let guard = self.state.lock();
        let Some(store) = guard.store.as_ref() else {
            return (Mode::Demo, None);
        };
        let mode = store.mode().unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "failed to read mode, using demo");
            Mode::Demo
        });
        let session = match store.client_session() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = ?e, "failed to read client session");
                None
            }
        };
        let token = match session {
            Some(s) if is_live(&s) => Some(s.token),
            Some(_) => {
                if let Err(e) = store.clear_client_session() {
                    tracing::warn!(error = ?e, "failed to drop expired session");
                }
                tracing::info!("client session expired");
                None
            }
            None => None,
        };
        (mode, token)
    }

    pub async fn request(&self, action: &str, params: Value) -> Value {
        let request_id = generate_request_id();
        let (mode, token) = self.local_context();

        // The mode is client-local, so switching it never goes to a remote backend.
        let local = matches!(action, "getMode" | "setMode");
        let resp = if mode == Mode::Api && !local {
            self.remote(action, &request_id, token, params).await
        } else {
            let mut req = Request::new(action, params);
            req.request_id = Some(request_id.clone());
            req.token = token;
            let mut guard = self.state.lock();
            api::handle_request(&mut guard, req)
        };

        self.track_session(action, &resp);
        resp
    }

    async fn remote(&self, action: &str, request_id: &str, token: Option<String>, params: Value) -> Value {
        let Some(base_url) = self.base_url.as_deref() else {
            return err(request_id, NOT_CONFIGURED, "API URL is not configured", None);
        };

        let mut body = json!({
            "action": action,
            "requestId": request_id,
            "token": token,
        });
        if let (Some(obj), Value::Object(extra)) = (body.as_object_mut(), params) {
            for (k, v) in extra {
                obj.entry(k).or_insert(v);
            }
        }

        let sent = self.client.post(base_url).json(&body).send().await;
        let reply = match sent {
            Ok(r) => r.json::<Value>().await,
            Err(e) => {
                tracing::warn!(error = %e, action, "api request failed");
                return err(request_id, NETWORK_ERROR, format!("cannot connect to server: {e}"), None);
            }
        };
        match reply {
            Ok(mut v) if v.is_object() => {
                v["requestId"] = json!(request_id);
                v
            }
            Ok(_) => err(request_id, NETWORK_ERROR, "cannot connect to server: unexpected reply", None),
            Err(e) => err(request_id, NETWORK_ERROR, format!("cannot connect to server: {e}"), None),
        }
    }

    fn track_session(&self, action: &str, resp: &Value) {
        let guard = self.state.lock();
        let Some(store) = guard.store.as_ref() else {
            return;
        };
        let succeeded = resp["success"].as_bool() == Some(true);
        let result = match action {
            "login" if succeeded => {
                let data = &resp["data"];
                let session = ClientSession {
                    token: data["token"].as_str().unwrap_or_default().to_string(),
                    expires_at: data["expiresAt"].as_str().unwrap_or_default().to_string(),
                    user: data["user"].clone(),
                };
                store.set_client_session(&session)
            }
            "logout" => store.clear_client_session(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(error = ?e, action, "failed to update client session");
        }
    }
}

fn is_live(session: &ClientSession) -> bool {
    !session.token.is_empty()
        && parse_timestamp(&session.expires_at).is_some_and(|exp| exp > Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AppState;
    use crate::store::Store;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn demo_api() -> Api {
        let mut state = AppState::new(false);
        state.store = Some(Store::in_memory().expect("store"));
        Api::new(Arc::new(Mutex::new(state)), None)
    }

    #[tokio::test]
    async fn demo_login_persists_session_and_logout_clears_it() {
        let api = demo_api();
        let login = api
            .request("login", json!({ "email": "teacher@demo.com", "password": "1234" }))
            .await;
        assert_eq!(login["success"], true, "{login}");

        let me = api.request("me", json!({})).await;
        assert_eq!(me["data"]["user"]["id"], "user_teacher1");

        api.request("logout", json!({})).await;
        let me = api.request("me", json!({})).await;
        assert_eq!(me["errorCode"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn api_mode_without_url_fails_cleanly() {
        let api = demo_api();
        api.request("setMode", json!({ "mode": "api" })).await;
        let resp = api.request("health", json!({})).await;
        assert_eq!(resp["success"], false);
        assert_eq!(resp["error"], "API URL is not configured");
        assert!(resp["requestId"].as_str().is_some());
    }

    #[tokio::test]
    async fn mode_switches_stay_local_in_api_mode() {
        let api = demo_api();
        let to_api = api.request("setMode", json!({ "mode": "api" })).await;
        assert_eq!(to_api["data"]["mode"], "api", "{to_api}");
        let current = api.request("getMode", json!({})).await;
        assert_eq!(current["data"]["mode"], "api", "{current}");

        let back = api.request("setMode", json!({ "mode": "demo" })).await;
        assert_eq!(back["success"], true, "{back}");
        let health = api.request("health", json!({})).await;
        assert_eq!(health["success"], true, "{health}");
        assert_eq!(health["data"]["mode"], "demo");
    }

    #[tokio::test]
    async fn remote_replies_carry_the_local_request_id() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let backend = axum::Router::new().route(
            "/api",
            axum::routing::post(|| async {
                axum::Json(json!({ "requestId": "remote-id", "success": true, "data": null }))
            }),
        );
        tokio::spawn(async move {
            let _ = axum::serve(listener, backend).await;
        });

        let mut state = AppState::new(false);
        state.store = Some(Store::in_memory().expect("store"));
        let api = Api::new(Arc::new(Mutex::new(state)), Some(format!("http://{addr}/api")));
        api.request("setMode", json!({ "mode": "api" })).await;

        let resp = api.request("health", json!({})).await;
        assert_eq!(resp["success"], true, "{resp}");
        let id = resp["requestId"].as_str().expect("request id");
        assert_ne!(id, "remote-id");
        assert!(id.starts_with("req_"));
    }

    #[test]
    fn expired_sessions_are_not_live() {
        let session = ClientSession {
            token: "t".into(),
            expires_at: "2000-01-01T00:00:00Z".into(),
            user: Value::Null,
        };
        assert!(!is_live(&session));
    }
}
