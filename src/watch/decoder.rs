//! Event Decoder
//!
//! Turns one raw wire message into a [`ChangeNotification`]. Pure and
//! deterministic: no I/O, no logging, no shared state. A message that cannot
//! be understood decodes to `None` and is simply skipped by the caller, so one
//! malformed event never aborts an otherwise healthy stream.

use serde::Deserialize;
use serde_json::Value;

use crate::constants::DONE_SENTINEL;
use crate::types::lenient;
use crate::ChangeKind;
use crate::ChangeNotification;
use crate::SessionSnapshot;

/// Wire payload of one change event
#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    kind: String,
    #[serde(default, deserialize_with = "lenient")]
    resource_id: String,
    #[serde(default)]
    object: Option<Value>,
}

/// Returns true for the frame announcing a deliberate end of the stream.
///
/// The sentinel is a connection-level signal and never decodes to a
/// notification.
pub fn is_done_marker(raw: &str) -> bool {
    raw.trim() == DONE_SENTINEL
}

/// Decodes one message unit.
///
/// Returns `None` for empty payloads, the `[DONE]` sentinel, invalid JSON and
/// JSON that is not an object. Unrecognized `type` values become
/// [`ChangeKind::Unknown`].
pub fn decode(raw: &str) -> Option<ChangeNotification> {
    let raw = raw.trim();
    if raw.is_empty() || is_done_marker(raw) {
        return None;
    }

    let value: Value = serde_json::from_str(raw).ok()?;
    if !value.is_object() {
        return None;
    }
    let wire: WireEvent = serde_json::from_value(value).ok()?;

    let kind = ChangeKind::from_wire(&wire.kind);
    let resource = match wire.object {
        Some(object @ Value::Object(_)) => serde_json::from_value::<SessionSnapshot>(object).ok(),
        _ => None,
    };
    // deletions may omit the object; every other kind carries a snapshot
    let resource = match (resource, kind) {
        (None, ChangeKind::Deleted) => None,
        (resource, _) => Some(resource.unwrap_or_default()),
    };

    let resource_id = match (wire.resource_id.is_empty(), &resource) {
        (true, Some(snapshot)) if !snapshot.id.is_empty() => snapshot.id.clone(),
        _ => wire.resource_id,
    };

    Some(ChangeNotification {
        kind,
        resource_id,
        resource,
    })
}
