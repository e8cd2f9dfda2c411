// GroupId Resolution (pure)

use serde_json::Value;

use crate::domain::{JobPayload, QueueCategory};
use crate::error::{AppError, Result};

/// Payload field names consulted during resolution
pub const INSTANCE_ID_FIELD: &str = "instanceId";
pub const CUSTOMER_ID_FIELD: &str = "customerId";
pub const GROUP_ID_FIELD: &str = "groupId";

/// Derive the group key for a submission.
///
/// Priority: explicit id, then `instanceId:customerId`, then `instanceId`,
/// then the payload's own `groupId`. Strings and integers count as
/// identifiers; empty strings, `null` and any other JSON type count as absent.
pub fn resolve_group_id(
    category: QueueCategory,
    payload: &JobPayload,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(group) = explicit.filter(|g| !g.is_empty()) {
        return Ok(group.to_string());
    }

    let instance = payload_identifier(payload, INSTANCE_ID_FIELD);
    let customer = payload_identifier(payload, CUSTOMER_ID_FIELD);

    match (instance, customer) {
        (Some(instance), Some(customer)) => Ok(format!("{instance}:{customer}")),
        (Some(instance), None) => Ok(instance),
        _ => payload_identifier(payload, GROUP_ID_FIELD)
            .ok_or(AppError::MissingGroupId { category }),
    }
}

/// Identifier stored under `key`, using the same rules as resolution
pub fn payload_identifier(payload: &JobPayload, key: &str) -> Option<String> {
    payload.field(key).and_then(identifier)
}

fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}
