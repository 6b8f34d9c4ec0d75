use crate::domain::repository::AuditRepository;
use crate::domain::types::AuditEvent;

/// Append an audit event. A failed write is logged and never reaches the caller.
pub async fn record<D: AuditRepository>(audit: &D, event: AuditEvent) {
    if let Err(e) = audit.append(&event).await {
        tracing::warn!(
            error = ?e,
            action = event.action.as_str(),
            success = event.success,
            "failed to write audit event"
        );
    }
}
