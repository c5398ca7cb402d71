use super::error::{err, ok, ApiError};
use super::handlers;
use super::types::{AppState, Request};
use crate::util::generate_request_id;

type HandlerResult = Option<Result<serde_json::Value, ApiError>>;

const FAMILIES: &[fn(&mut AppState, &Request) -> HandlerResult] = &[
    handlers::core::try_handle,
    handlers::navigation::try_handle,
    handlers::auth::try_handle,
    handlers::classes::try_handle,
    handlers::subjects::try_handle,
    handlers::catalog::try_handle,
    handlers::class_subjects::try_handle,
    handlers::assignments::try_handle,
    handlers::submissions::try_handle,
    handlers::grading::try_handle,
    handlers::parents::try_handle,
    handlers::notifications::try_handle,
    handlers::admin::try_handle,
    handlers::exports::try_handle,
    handlers::dashboards::try_handle,
];

pub fn handle_request(state: &mut AppState, mut req: Request) -> serde_json::Value {
    let request_id = req
        .request_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(generate_request_id);
    if req.token.as_deref().map_or(true, str::is_empty) && state.remember_sessions {
        req.token = state.remembered_token.clone();
    }
    tracing::debug!(action = %req.action, request_id = %request_id, "request");

    match dispatch(state, &req) {
        Ok(data) => ok(&request_id, data),
        Err(e) => {
            match &e {
                ApiError::Internal(inner) => {
                    tracing::error!(action = %req.action, error = ?inner, "request failed")
                }
                other => {
                    tracing::debug!(action = %req.action, code = other.code(), "request rejected")
                }
            }
            err(&request_id, e.code(), e.to_string(), e.details())
        }
    }
}

fn dispatch(state: &mut AppState, req: &Request) -> Result<serde_json::Value, ApiError> {
    if req.action.trim().is_empty() {
        return Err(ApiError::BadRequest("missing action".into()));
    }
    for family in FAMILIES {
        if let Some(result) = family(state, req) {
            return result;
        }
    }
    Err(ApiError::UnknownAction(req.action.clone()))
}
