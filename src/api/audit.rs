use crate::models::{AuditLog, User};
use crate::store::Store;
use crate::util::{generate_id, now_iso};

pub fn record(
    store: &Store,
    actor: &User,
    action: &str,
    target_type: &str,
    target_id: &str,
    detail: impl Into<String>,
) -> anyhow::Result<()> {
    let entry = AuditLog {
        id: generate_id(),
        user_id: actor.id.clone(),
        action: action.to_string(),
        target_type: target_type.to_string(),
        target_id: target_id.to_string(),
        detail: detail.into(),
        created_at: now_iso(),
    };
    store.insert(&entry)?;
    tracing::info!(user_id = %actor.id, action, target_type, target_id, "audit");
    Ok(())
}
