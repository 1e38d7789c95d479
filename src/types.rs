//! Change notifications and the options a caller passes to `watch`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::constants::DEFAULT_RESOURCE_KIND;

/// Kind of change reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// Any wire value other than the three above
    Unknown,
}

impl ChangeKind {
    /// Maps a wire `type` value. Matching is case-sensitive.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "CREATED" => ChangeKind::Created,
            "UPDATED" => ChangeKind::Updated,
            "DELETED" => ChangeKind::Deleted,
            _ => ChangeKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "CREATED",
            ChangeKind::Updated => "UPDATED",
            ChangeKind::Deleted => "DELETED",
            ChangeKind::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One create/update/delete event for a watched resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeNotification {
    pub kind: ChangeKind,
    /// Identifier of the changed resource; empty only when the server sent none
    pub resource_id: String,
    /// State of the resource at the moment of the event. Absent for most deletions.
    pub resource: Option<SessionSnapshot>,
}

impl ChangeNotification {
    pub fn is_created(&self) -> bool {
        self.kind == ChangeKind::Created
    }

    pub fn is_updated(&self) -> bool {
        self.kind == ChangeKind::Updated
    }

    pub fn is_deleted(&self) -> bool {
        self.kind == ChangeKind::Deleted
    }
}

/// Immutable view of a session record as carried in a change notification.
///
/// Every field falls back to its zero value when the payload omits it or
/// carries a value of the wrong JSON type, so a partial payload never fails
/// the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    #[serde(deserialize_with = "lenient")]
    pub id: String,
    #[serde(deserialize_with = "lenient_kind")]
    pub kind: String,
    #[serde(deserialize_with = "lenient")]
    pub href: String,
    #[serde(deserialize_with = "lenient")]
    pub created_at: String,
    #[serde(deserialize_with = "lenient")]
    pub updated_at: String,
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    #[serde(deserialize_with = "lenient")]
    pub repo_url: String,
    #[serde(deserialize_with = "lenient")]
    pub prompt: String,
    #[serde(deserialize_with = "lenient")]
    pub created_by_user_id: String,
    #[serde(deserialize_with = "lenient")]
    pub assigned_user_id: String,
    #[serde(deserialize_with = "lenient")]
    pub workflow_id: String,
    #[serde(deserialize_with = "lenient")]
    pub repos: String,
    #[serde(deserialize_with = "lenient")]
    pub timeout: i64,
    #[serde(deserialize_with = "lenient")]
    pub llm_model: String,
    #[serde(deserialize_with = "lenient")]
    pub llm_temperature: f64,
    #[serde(deserialize_with = "lenient")]
    pub llm_max_tokens: i64,
    #[serde(deserialize_with = "lenient")]
    pub parent_session_id: String,
    #[serde(deserialize_with = "lenient")]
    pub bot_account_name: String,
    #[serde(deserialize_with = "lenient")]
    pub resource_overrides: String,
    #[serde(deserialize_with = "lenient")]
    pub environment_variables: String,
    #[serde(deserialize_with = "lenient")]
    pub labels: String,
    #[serde(deserialize_with = "lenient")]
    pub annotations: String,
    #[serde(deserialize_with = "lenient")]
    pub project_id: String,
    #[serde(deserialize_with = "lenient")]
    pub phase: String,
    #[serde(deserialize_with = "lenient")]
    pub start_time: String,
    #[serde(deserialize_with = "lenient")]
    pub completion_time: String,
    #[serde(deserialize_with = "lenient")]
    pub sdk_session_id: String,
    #[serde(deserialize_with = "lenient")]
    pub sdk_restart_count: i64,
    #[serde(deserialize_with = "lenient")]
    pub conditions: String,
    #[serde(deserialize_with = "lenient")]
    pub reconciled_repos: String,
    #[serde(deserialize_with = "lenient")]
    pub reconciled_workflow: String,
    #[serde(deserialize_with = "lenient")]
    pub kube_cr_name: String,
    #[serde(deserialize_with = "lenient")]
    pub kube_cr_uid: String,
    #[serde(deserialize_with = "lenient")]
    pub kube_namespace: String,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: DEFAULT_RESOURCE_KIND.to_string(),
            href: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
            name: String::new(),
            repo_url: String::new(),
            prompt: String::new(),
            created_by_user_id: String::new(),
            assigned_user_id: String::new(),
            workflow_id: String::new(),
            repos: String::new(),
            timeout: 0,
            llm_model: String::new(),
            llm_temperature: 0.0,
            llm_max_tokens: 0,
            parent_session_id: String::new(),
            bot_account_name: String::new(),
            resource_overrides: String::new(),
            environment_variables: String::new(),
            labels: String::new(),
            annotations: String::new(),
            project_id: String::new(),
            phase: String::new(),
            start_time: String::new(),
            completion_time: String::new(),
            sdk_session_id: String::new(),
            sdk_restart_count: 0,
            conditions: String::new(),
            reconciled_repos: String::new(),
            reconciled_workflow: String::new(),
            kube_cr_name: String::new(),
            kube_cr_uid: String::new(),
            kube_namespace: String::new(),
        }
    }
}

/// Deserializes a field, falling back to its zero value when the wire value
/// is `null` or of the wrong type.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn lenient_kind<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let kind: String = lenient(deserializer)?;
    if kind.is_empty() {
        return Ok(DEFAULT_RESOURCE_KIND.to_string());
    }
    Ok(kind)
}

/// Caller-supplied settings for one watch session
///
/// Immutable once the session starts.
///
/// # Example
/// ```ignore
/// let cancel = CancellationToken::new();
/// let options = WatchOptions::default()
///     .timeout(Duration::from_secs(60))
///     .cancellation(cancel.clone());
/// ```
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Opaque position to resume from, as returned by
    /// [`WatchStream::resume_token`](crate::WatchStream::resume_token)
    pub resume_token: Option<String>,
    /// Ends the session cleanly this long after watch start
    pub timeout: Option<Duration>,
    /// Ends the session cleanly when cancelled
    pub cancellation: Option<CancellationToken>,
}

impl WatchOptions {
    pub fn resume_token(
        mut self,
        token: impl Into<String>,
    ) -> Self {
        self.resume_token = Some(token.into());
        self
    }

    pub fn timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellation(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.cancellation = Some(token);
        self
    }
}
