//! Watch client entry point
//!
//! Resolves base URL, collection and credentials into a subscription target
//! and hands out watch sessions against it.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::WatchClientConfig;
use crate::watch::ChangeWatcher;
use crate::watch::HttpTransport;
use crate::watch::SubscriptionTarget;
use crate::watch::Transport;
use crate::watch::WatchStream;
use crate::BackoffPolicy;
use crate::Result;
use crate::WatchOptions;

/// Client for one watched collection
///
/// # Example
/// ```ignore
/// use ambient_watch::{WatchClient, WatchOptions};
/// use futures::StreamExt;
///
/// let client = WatchClient::builder("https://api.example.com")
///     .token("sha256~...")
///     .project("team-a")
///     .build()?;
///
/// let mut stream = client.watch(WatchOptions::default());
/// while let Some(event) = stream.next().await {
///     println!("{:?}", event?);
/// }
/// ```
pub struct WatchClient {
    config: WatchClientConfig,
    watcher: ChangeWatcher,
}

impl WatchClient {
    pub fn builder(base_url: impl Into<String>) -> WatchClientBuilder {
        WatchClientBuilder::new(base_url)
    }

    /// Builds a client over HTTP from a loaded configuration
    pub fn from_config(config: WatchClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.connection.connect_timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Builds a client over a custom transport
    pub fn with_transport(
        config: WatchClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let config = config.validate()?;

        let target = SubscriptionTarget {
            url: config.connection.subscription_url()?,
            bearer_token: config.connection.token.clone(),
            project: config.connection.project.clone(),
        };
        debug!(url = %target.url, "watch client ready");

        let watcher = ChangeWatcher::new(transport, target, config.watch.clone());
        Ok(Self { config, watcher })
    }

    /// Starts a watch session. See [`ChangeWatcher::watch`].
    pub fn watch(
        &self,
        options: WatchOptions,
    ) -> WatchStream {
        self.watcher.watch(options)
    }

    /// Closes every session started by this client
    pub fn close(&self) -> usize {
        self.watcher.close()
    }

    pub fn is_closed(&self) -> bool {
        self.watcher.is_closed()
    }

    pub fn config(&self) -> &WatchClientConfig {
        &self.config
    }

    /// Reconnect policy configured for [`resume_watch`](crate::watch::resume_watch)
    pub fn retry_policy(&self) -> BackoffPolicy {
        self.config.retry
    }
}

pub struct WatchClientBuilder {
    config: WatchClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl WatchClientBuilder {
    /// Create a new builder with default config and the given API base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut config = WatchClientConfig::default();
        config.connection.base_url = base_url.into();
        Self {
            config,
            transport: None,
        }
    }

    /// Bearer credential sent with every request
    pub fn token(
        mut self,
        token: impl Into<String>,
    ) -> Self {
        self.config.connection.token = Some(token.into());
        self
    }

    /// Project scope (`X-Ambient-Project`)
    pub fn project(
        mut self,
        project: impl Into<String>,
    ) -> Self {
        self.config.connection.project = Some(project.into());
        self
    }

    /// Watched collection (default: `sessions`)
    pub fn collection(
        mut self,
        collection: impl Into<String>,
    ) -> Self {
        self.config.connection.collection = collection.into();
        self
    }

    /// Set connection timeout (default: 5s)
    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.connection.connect_timeout_in_ms = timeout.as_millis() as u64;
        self
    }

    /// Timeout for sessions whose options set none (default: 30 min)
    pub fn default_timeout(
        mut self,
        timeout: Option<Duration>,
    ) -> Self {
        self.config.watch.default_timeout_in_ms = timeout.map(|t| t.as_millis() as u64).unwrap_or(0);
        self
    }

    /// Bound the per-session buffer, dropping the oldest notification when
    /// full (default: unbounded)
    pub fn max_pending_events(
        mut self,
        max: usize,
    ) -> Self {
        self.config.watch.max_pending_events = max;
        self
    }

    pub fn retry_policy(
        mut self,
        policy: BackoffPolicy,
    ) -> Self {
        self.config.retry = policy;
        self
    }

    /// Use a custom transport instead of HTTP
    pub fn transport(
        mut self,
        transport: Arc<dyn Transport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Completely replaces the default configuration
    ///
    /// # Warning: Configuration Override
    /// This will discard all previous settings configured through individual
    /// methods like [`token`](WatchClientBuilder::token) or
    /// [`connect_timeout`](WatchClientBuilder::connect_timeout), including
    /// the base URL passed to [`new`](WatchClientBuilder::new).
    pub fn set_config(
        mut self,
        config: WatchClientConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and build the client.
    ///
    /// Fails with [`Error::Config`](crate::Error::Config) on malformed
    /// parameters, before any network activity.
    pub fn build(self) -> Result<WatchClient> {
        match self.transport {
            Some(transport) => WatchClient::with_transport(self.config, transport),
            None => WatchClient::from_config(self.config),
        }
    }
}
