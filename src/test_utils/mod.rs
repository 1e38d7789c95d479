//! Shared components for the unit tests: an in-memory transport whose frames
//! are pushed by the test body.
mod scripted_transport;

pub use scripted_transport::*;

/// Wire payload of one change event
pub fn change_event(
    kind: &str,
    resource_id: &str,
) -> String {
    serde_json::json!({
        "type": kind,
        "resource_id": resource_id,
        "object": { "id": resource_id, "name": format!("session-{resource_id}") }
    })
    .to_string()
}
