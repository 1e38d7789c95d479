use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use futures::Stream;

use super::session::Lifecycle;
use super::session::ShutdownReason;
use super::session::WatchSession;
use crate::ChangeNotification;
use crate::StreamError;

/// Lazy, forward-only sequence of change notifications for one session.
///
/// Yields buffered notifications in arrival order, then at most one
/// [`StreamError`], then ends. Dropping the stream shuts the session down and
/// releases its connection.
pub struct WatchStream {
    session: Arc<WatchSession>,
}

/// Cloneable handle that can close a [`WatchStream`] from another task
#[derive(Clone)]
pub struct WatchHandle {
    session: Arc<WatchSession>,
}

impl WatchStream {
    pub(crate) fn new(session: Arc<WatchSession>) -> Self {
        Self { session }
    }

    /// Closes the session. Undelivered notifications are discarded and the
    /// sequence ends. Returns `true` only for the call that did the teardown.
    pub fn close(&self) -> bool {
        self.session.shutdown(ShutdownReason::Closed)
    }

    pub fn handle(&self) -> WatchHandle {
        WatchHandle {
            session: self.session.clone(),
        }
    }

    /// Last event id seen on the wire, to resume a later watch from
    pub fn resume_token(&self) -> Option<String> {
        self.session.last_event_id()
    }

    /// Notifications discarded because the buffer was full
    pub fn dropped_count(&self) -> u64 {
        self.session.dropped_count()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.session.lifecycle()
    }

    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.session.shutdown_reason()
    }

    pub fn session_id(&self) -> u64 {
        self.session.id()
    }

    /// Resolves once the session is CLOSED and its connection released
    pub async fn closed(&self) {
        self.session.closed().await
    }
}

impl WatchHandle {
    pub fn close(&self) -> bool {
        self.session.shutdown(ShutdownReason::Closed)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.session.lifecycle()
    }

    pub async fn closed(&self) {
        self.session.closed().await
    }
}

impl Stream for WatchStream {
    type Item = std::result::Result<ChangeNotification, StreamError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.session.poll_next(cx)
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.session.shutdown(ShutdownReason::Dropped);
    }
}

impl std::fmt::Debug for WatchStream {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchStream")
            .field("session_id", &self.session.id())
            .field("lifecycle", &self.session.lifecycle())
            .finish()
    }
}
