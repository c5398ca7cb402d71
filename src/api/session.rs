use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::Request;
use crate::models::{Role, Session, User};
use crate::store::Store;
use crate::util::parse_timestamp;

/// Resolves the request token to an active user. Revoked, expired or
/// unknown sessions resolve to nobody.
pub fn current_user(store: &Store, req: &Request) -> Result<Option<User>, ApiError> {
    let Some(token) = req.token.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let Some(session) = store.get::<Session>(token)? else {
        return Ok(None);
    };
    if session.is_revoked {
        return Ok(None);
    }
    let expired = parse_timestamp(&session.expires_at)
        .map(|exp| exp <= Utc::now())
        .unwrap_or(true);
    if expired {
        return Ok(None);
    }
    Ok(store.get::<User>(&session.user_id)?.filter(|u| u.is_active))
}

pub fn require_user(store: &Store, req: &Request) -> Result<User, ApiError> {
    current_user(store, req)?.ok_or_else(|| ApiError::Unauthorized("not logged in".into()))
}

pub fn require_role(store: &Store, req: &Request, roles: &[Role]) -> Result<User, ApiError> {
    let user = require_user(store, req)?;
    if roles.contains(&user.role) {
        return Ok(user);
    }
    tracing::warn!(
        action = %req.action,
        user_id = %user.id,
        role = user.role.as_str(),
        "access denied"
    );
    Err(ApiError::forbidden())
}
