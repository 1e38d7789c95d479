//! Watch session state and the single shutdown routine
//!
//! A [`WatchSession`] is shared by three parties:
//! - the connection read loop, which appends notifications (as a [`FrameSink`])
//! - the consumer, which pulls them through [`WatchStream`](super::WatchStream)
//! - the supervisor task, which fires the timeout and cancellation triggers
//!
//! Every mutation goes through one lock. Shutdown is a compare-and-set on the
//! lifecycle under that lock, so only the first trigger tears down the
//! connection no matter how many fire concurrently.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::connection::ConnectionHandle;
use super::connection::FrameSink;
use super::decoder::decode;
use super::framing::RawFrame;
use crate::metrics::FRAMES_SKIPPED;
use crate::metrics::NOTIFICATIONS_DROPPED;
use crate::metrics::NOTIFICATIONS_RECEIVED;
use crate::metrics::SESSION_SHUTDOWNS;
use crate::ChangeNotification;
use crate::StreamError;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a watch session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accepting and queuing notifications
    Open,
    /// Shutdown requested, connection being released
    Closing,
    /// Connection released; nothing more will be queued
    Closed,
}

/// What ended a watch session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Explicit close by the caller
    Closed,
    /// The session timeout elapsed
    Timeout,
    /// The caller's cancellation token fired
    Cancelled,
    /// The stream was dropped without being closed
    Dropped,
    /// The connection failed or the server closed it unexpectedly
    TransportError,
    /// The server sent the termination sentinel
    Completed,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::Closed => "closed",
            ShutdownReason::Timeout => "timeout",
            ShutdownReason::Cancelled => "cancelled",
            ShutdownReason::Dropped => "dropped",
            ShutdownReason::TransportError => "transport_error",
            ShutdownReason::Completed => "completed",
        }
    }

    /// Caller-initiated shutdowns discard what the caller has not pulled yet.
    /// Upstream ones keep it so it is delivered ahead of the error or end.
    pub fn discards_pending(&self) -> bool {
        !matches!(self, ShutdownReason::TransportError | ShutdownReason::Completed)
    }
}

struct SessionState {
    lifecycle: Lifecycle,
    reason: Option<ShutdownReason>,
    pending: VecDeque<ChangeNotification>,
    error: Option<StreamError>,
    waker: Option<Waker>,
    dropped: u64,
    last_event_id: Option<String>,
}

pub struct WatchSession {
    id: u64,
    max_pending: usize,
    state: Mutex<SessionState>,
    connection: Mutex<Option<ConnectionHandle>>,
    /// Fired when the first shutdown trigger wins
    shutdown: CancellationToken,
    /// Fired when the session reaches [`Lifecycle::Closed`]
    released: CancellationToken,
}

impl WatchSession {
    pub(crate) fn new(max_pending: usize) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            max_pending,
            state: Mutex::new(SessionState {
                lifecycle: Lifecycle::Open,
                reason: None,
                pending: VecDeque::new(),
                error: None,
                waker: None,
                dropped: 0,
                last_event_id: None,
            }),
            connection: Mutex::new(None),
            shutdown: CancellationToken::new(),
            released: CancellationToken::new(),
        }
    }

    /// A session that never opens a connection and is already CLOSED
    pub(crate) fn already_closed(reason: ShutdownReason) -> Self {
        let session = Self::new(0);
        {
            let mut state = session.state.lock();
            state.lifecycle = Lifecycle::Closed;
            state.reason = Some(reason);
        }
        session.shutdown.cancel();
        session.released.cancel();
        session
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.state.lock().reason
    }

    pub fn dropped_count(&self) -> u64 {
        self.state.lock().dropped
    }

    pub fn last_event_id(&self) -> Option<String> {
        self.state.lock().last_event_id.clone()
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Resolves once the connection has been released
    pub async fn closed(&self) {
        self.released.cancelled().await
    }

    /// Hands the session its connection. If a shutdown already happened the
    /// connection is closed right away.
    pub(crate) fn attach(
        &self,
        handle: ConnectionHandle,
    ) {
        let is_open = self.state.lock().lifecycle == Lifecycle::Open;
        if !is_open {
            handle.close();
            return;
        }

        *self.connection.lock() = Some(handle);

        // A trigger may have fired between the check and the store
        if self.state.lock().lifecycle != Lifecycle::Open {
            if let Some(handle) = self.connection.lock().take() {
                handle.close();
            }
        }
    }

    /// Runs the shutdown routine. Returns `true` only for the trigger that
    /// performed it; every later call is a no-op.
    pub fn shutdown(
        &self,
        reason: ShutdownReason,
    ) -> bool {
        self.shutdown_with(reason, None)
    }

    fn shutdown_with(
        &self,
        reason: ShutdownReason,
        error: Option<StreamError>,
    ) -> bool {
        let (discarded, waker) = {
            let mut state = self.state.lock();
            if state.lifecycle != Lifecycle::Open {
                return false;
            }
            state.lifecycle = Lifecycle::Closing;
            state.reason = Some(reason);

            let mut discarded = 0;
            if reason.discards_pending() {
                discarded = state.pending.len();
                state.pending.clear();
            } else {
                state.error = error;
            }
            (discarded, state.waker.take())
        };

        debug!(
            session_id = self.id,
            reason = reason.as_str(),
            discarded,
            "watch session shutting down"
        );
        SESSION_SHUTDOWNS.with_label_values(&[reason.as_str()]).inc();

        self.shutdown.cancel();
        if let Some(handle) = self.connection.lock().take() {
            handle.close();
        }

        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Pull side of the session.
    ///
    /// Buffered notifications first, then the terminal error (once), then
    /// end-of-sequence as soon as the session is no longer open.
    pub(crate) fn poll_next(
        &self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<std::result::Result<ChangeNotification, StreamError>>> {
        let mut state = self.state.lock();

        if let Some(notification) = state.pending.pop_front() {
            return Poll::Ready(Some(Ok(notification)));
        }
        if let Some(error) = state.error.take() {
            return Poll::Ready(Some(Err(error)));
        }
        if state.lifecycle != Lifecycle::Open {
            return Poll::Ready(None);
        }

        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl FrameSink for WatchSession {
    fn on_message(
        &self,
        frame: RawFrame,
    ) -> ControlFlow<()> {
        let notification = decode(&frame.data);

        let waker = {
            let mut state = self.state.lock();
            if state.lifecycle != Lifecycle::Open {
                return ControlFlow::Break(());
            }
            if let Some(id) = frame.id {
                state.last_event_id = Some(id);
            }

            let Some(notification) = notification else {
                drop(state);
                FRAMES_SKIPPED.inc();
                warn!(
                    session_id = self.id,
                    len = frame.data.len(),
                    "skipping undecodable watch frame"
                );
                return ControlFlow::Continue(());
            };

            if self.max_pending > 0 && state.pending.len() >= self.max_pending {
                if let Some(oldest) = state.pending.pop_front() {
                    state.dropped += 1;
                    NOTIFICATIONS_DROPPED.inc();
                    warn!(
                        session_id = self.id,
                        resource_id = %oldest.resource_id,
                        max_pending = self.max_pending,
                        "watch buffer full, dropping oldest notification"
                    );
                }
            }

            trace!(
                session_id = self.id,
                kind = notification.kind.as_str(),
                resource_id = %notification.resource_id,
                "queued change notification"
            );
            NOTIFICATIONS_RECEIVED
                .with_label_values(&[notification.kind.as_str()])
                .inc();
            state.pending.push_back(notification);
            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
        ControlFlow::Continue(())
    }

    fn on_end(&self) {
        self.shutdown_with(ShutdownReason::Completed, None);
    }

    fn on_terminal_error(
        &self,
        error: StreamError,
    ) {
        self.shutdown_with(ShutdownReason::TransportError, Some(error));
    }

    fn on_released(&self) {
        let waker = {
            let mut state = self.state.lock();
            if state.lifecycle == Lifecycle::Open {
                // Released without any trigger: nothing more can arrive
                state.reason = Some(ShutdownReason::TransportError);
                self.shutdown.cancel();
            }
            state.lifecycle = Lifecycle::Closed;
            state.waker.take()
        };

        trace!(session_id = self.id, "watch session closed");
        self.released.cancel();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}
