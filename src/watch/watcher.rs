use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::connection::StreamConnection;
use super::session::ShutdownReason;
use super::session::WatchSession;
use super::stream::WatchStream;
use super::transport::SubscribeRequest;
use super::transport::Transport;
use crate::config::redact;
use crate::config::WatchConfig;
use crate::constants::RESOURCE_VERSION_QUERY_KEY;
use crate::metrics::SESSIONS_OPENED;
use crate::WatchOptions;

/// Already-resolved location and credentials of a watched collection
#[derive(Clone, PartialEq, Eq)]
pub struct SubscriptionTarget {
    /// Change-stream URL, including `watch=true`
    pub url: Url,
    pub bearer_token: Option<String>,
    pub project: Option<String>,
}

impl std::fmt::Debug for SubscriptionTarget {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SubscriptionTarget")
            .field("url", &self.url.as_str())
            .field("bearer_token", &self.bearer_token.as_deref().map(redact))
            .field("project", &self.project)
            .finish()
    }
}

impl SubscriptionTarget {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            bearer_token: None,
            project: None,
        }
    }

    /// Request for one subscription, resuming from `resume_token` when given
    pub fn request(
        &self,
        resume_token: Option<&str>,
    ) -> SubscribeRequest {
        let resume_token = resume_token.filter(|t| !t.is_empty());

        let mut url = self.url.clone();
        if let Some(token) = resume_token {
            url.query_pairs_mut().append_pair(RESOURCE_VERSION_QUERY_KEY, token);
        }

        SubscribeRequest {
            url,
            bearer_token: self.bearer_token.clone(),
            project: self.project.clone(),
            resume_token: resume_token.map(str::to_string),
        }
    }
}

/// Change Watcher
///
/// Starts watch sessions against one collection. Each [`watch`](Self::watch)
/// call opens exactly one connection; [`close`](Self::close) ends every
/// session this watcher started.
pub struct ChangeWatcher {
    transport: Arc<dyn Transport>,
    target: SubscriptionTarget,
    config: WatchConfig,
    state: Mutex<WatcherState>,
}

#[derive(Default)]
struct WatcherState {
    closed: bool,
    sessions: Vec<Weak<WatchSession>>,
}

impl ChangeWatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        target: SubscriptionTarget,
        config: WatchConfig,
    ) -> Self {
        Self {
            transport,
            target,
            config,
            state: Mutex::new(WatcherState::default()),
        }
    }

    pub fn target(&self) -> &SubscriptionTarget {
        &self.target
    }

    /// Starts a watch session.
    ///
    /// Returns immediately; the connection is opened in the background and
    /// any failure is delivered through the returned stream. On a closed
    /// watcher, or with an already cancelled token, the stream is empty and
    /// nothing is sent over the network.
    ///
    /// Must be called within a tokio runtime.
    pub fn watch(
        &self,
        options: WatchOptions,
    ) -> WatchStream {
        if options.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
            debug!("watch requested with a cancelled token");
            return WatchStream::new(Arc::new(WatchSession::already_closed(ShutdownReason::Cancelled)));
        }

        let session = {
            let mut state = self.state.lock();
            if state.closed {
                debug!("watch requested on a closed watcher");
                return WatchStream::new(Arc::new(WatchSession::already_closed(ShutdownReason::Closed)));
            }

            let session = Arc::new(WatchSession::new(self.config.max_pending_events));
            state.sessions.retain(|s| s.strong_count() > 0);
            state.sessions.push(Arc::downgrade(&session));
            session
        };

        let timeout = options.timeout.or_else(|| self.config.default_timeout());
        // timeouts past the clock range mean no deadline
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let request = self.target.request(options.resume_token.as_deref());

        SESSIONS_OPENED.inc();
        debug!(
            session_id = session.id(),
            ?timeout,
            ?request,
            "starting watch session"
        );

        let handle = StreamConnection::open(self.transport.clone(), request, session.clone());
        session.attach(handle);

        tokio::spawn(supervise(session.clone(), deadline, options.cancellation));

        WatchStream::new(session)
    }

    /// Closes every session started by this watcher and refuses new ones.
    ///
    /// Returns the number of sessions this call shut down. Repeated calls are
    /// no-ops.
    pub fn close(&self) -> usize {
        let sessions = {
            let mut state = self.state.lock();
            if state.closed {
                return 0;
            }
            state.closed = true;
            std::mem::take(&mut state.sessions)
        };

        let closed = sessions
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|session| session.shutdown(ShutdownReason::Closed))
            .count();
        debug!(closed, "change watcher closed");
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Fires the timeout and cancellation triggers. Exits as soon as the session
/// shuts down for any reason.
async fn supervise(
    session: Arc<WatchSession>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
) {
    let shutdown = session.shutdown_token();

    let timed_out = async move {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    let cancelled = async move {
        match cancellation {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = timed_out => {
            session.shutdown(ShutdownReason::Timeout);
        }
        _ = cancelled => {
            session.shutdown(ShutdownReason::Cancelled);
        }
    }
}
