use std::fmt::Debug;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::config_error;
use crate::constants::WATCH_QUERY_KEY;
use crate::Result;

/// Location of the watched collection and the credential sent with each request
#[derive(Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    /// API server base URL, e.g. `https://api.example.com`
    /// Default: "http://localhost:8080"
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path prefix of the resource API below the base URL
    /// Default: "/api/ambient/v1"
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Name of the watched collection
    /// Default: "sessions"
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Bearer credential attached to every request
    #[serde(default)]
    pub token: Option<String>,

    /// Project the collection is scoped to (`X-Ambient-Project` header)
    #[serde(default)]
    pub project: Option<String>,

    /// TCP connect timeout in milliseconds
    /// Default: 5000
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_in_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_path: default_api_path(),
            collection: default_collection(),
            token: None,
            project: None,
            connect_timeout_in_ms: default_connect_timeout(),
        }
    }
}

impl Debug for ConnectionConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("api_path", &self.api_path)
            .field("collection", &self.collection)
            .field("token", &self.token.as_deref().map(redact))
            .field("project", &self.project)
            .field("connect_timeout_in_ms", &self.connect_timeout_in_ms)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<()> {
        self.parse_base_url()?;

        if self.collection.trim().is_empty() {
            return Err(config_error("collection cannot be empty"));
        }

        if self.collection.contains('/') {
            return Err(config_error(format!(
                "collection '{}' must be a single path segment",
                self.collection
            )));
        }

        if self.connect_timeout_in_ms < 1 {
            return Err(config_error("connect_timeout_in_ms must be at least 1ms"));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_in_ms)
    }

    /// Builds the change-stream URL for the configured collection.
    ///
    /// `{base_url}{api_path}/{collection}?watch=true`
    pub fn subscription_url(&self) -> Result<Url> {
        let mut url = self.parse_base_url()?;

        let path = format!(
            "{}/{}/{}",
            url.path().trim_end_matches('/'),
            self.api_path.trim_matches('/'),
            self.collection.trim_matches('/'),
        );
        // An empty api_path would otherwise leave a `//` behind
        url.set_path(&path.replace("//", "/"));

        url.query_pairs_mut().append_pair(WATCH_QUERY_KEY, "true");

        Ok(url)
    }

    fn parse_base_url(&self) -> Result<Url> {
        if self.base_url.trim().is_empty() {
            return Err(config_error("base_url cannot be empty"));
        }

        let url = Url::parse(self.base_url.trim())
            .map_err(|e| config_error(format!("invalid base_url '{}': {}", self.base_url, e)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(config_error(format!(
                "base_url scheme must be http or https, got '{other}'"
            ))),
        }
    }
}

/// Shows only a short prefix of a credential
pub(crate) fn redact(token: &str) -> String {
    if token.len() < 8 {
        return "[REDACTED]".to_string();
    }
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}***({} chars)", token.len())
}

fn default_base_url() -> String {
    "http://localhost:8080".into()
}
fn default_api_path() -> String {
    "/api/ambient/v1".into()
}
fn default_collection() -> String {
    "sessions".into()
}
fn default_connect_timeout() -> u64 {
    5000
}
