use std::path::PathBuf;

use serde::Deserialize;

use crate::api::error::ApiError;
use crate::store::Store;

/// One request envelope. Everything besides the routing fields is a param.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub action: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl Request {
    pub fn new(action: &str, params: serde_json::Value) -> Request {
        Request {
            action: action.to_string(),
            request_id: None,
            token: None,
            params: match params {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
        }
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Store>,
    /// Token of the last successful login, used when a request carries none.
    pub remembered_token: Option<String>,
    pub remember_sessions: bool,
}

impl AppState {
    pub fn new(remember_sessions: bool) -> AppState {
        AppState {
            workspace: None,
            store: None,
            remembered_token: None,
            remember_sessions,
        }
    }

    pub fn store(&self) -> Result<&Store, ApiError> {
        self.store.as_ref().ok_or(ApiError::NoWorkspace)
    }

    pub fn store_mut(&mut self) -> Result<&mut Store, ApiError> {
        self.store.as_mut().ok_or(ApiError::NoWorkspace)
    }
}
