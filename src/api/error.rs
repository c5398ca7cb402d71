use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    BadParams(String),
    #[error("{message}")]
    Invalid {
        message: String,
        details: serde_json::Value,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("no workspace selected")]
    NoWorkspace,
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::BadParams(_) | ApiError::Invalid { .. } => "BAD_PARAMS",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::NoWorkspace => "NO_WORKSPACE",
            ApiError::UnknownAction(_) => "UNKNOWN_ACTION",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Invalid { details, .. } => Some(details.clone()),
            _ => None,
        }
    }

    pub fn forbidden() -> ApiError {
        ApiError::Forbidden("permission denied".into())
    }

    pub fn not_found(what: &str) -> ApiError {
        ApiError::NotFound(format!("{what} not found"))
    }
}

/// Success envelope; a null payload is left out.
pub fn ok(request_id: &str, data: serde_json::Value) -> serde_json::Value {
    let mut resp = json!({
        "requestId": request_id,
        "success": true,
    });
    if !data.is_null() {
        resp["data"] = data;
    }
    resp
}

pub fn err(
    request_id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut resp = json!({
        "requestId": request_id,
        "success": false,
        "error": message.into(),
        "errorCode": code,
    });
    if let Some(d) = details {
        resp["details"] = d;
    }
    resp
}
