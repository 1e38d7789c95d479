//! Stream Connection
//!
//! Owns one streaming subscription: a spawned read loop that forwards every
//! frame to a [`FrameSink`] until the stream ends, fails, or the handle is
//! closed. The sink sees at most one of `on_end` / `on_terminal_error`, and
//! neither after a caller-side close. `on_released` always comes last, after
//! the underlying response has been dropped.

use std::ops::ControlFlow;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::decoder::is_done_marker;
use super::framing::RawFrame;
use super::transport::SubscribeRequest;
use super::transport::Transport;
use crate::StreamError;

/// Receiver of connection callbacks
pub trait FrameSink: Send + Sync + 'static {
    /// One non-sentinel frame. `Break` stops reading.
    fn on_message(
        &self,
        frame: RawFrame,
    ) -> ControlFlow<()>;

    /// The server sent the termination sentinel
    fn on_end(&self);

    /// The connection failed or the server closed it unexpectedly
    fn on_terminal_error(
        &self,
        error: StreamError,
    );

    /// The underlying request has been released
    fn on_released(&self);
}

/// Cloneable close handle of one open connection
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl ConnectionHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                cancel: CancellationToken::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Releases the connection. Returns `true` only for the call that
    /// performed the teardown; closing an already closed handle is a no-op.
    pub fn close(&self) -> bool {
        if self.mark_closed() {
            self.inner.cancel.cancel();
            true
        } else {
            false
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn mark_closed(&self) -> bool {
        !self.inner.closed.swap(true, Ordering::AcqRel)
    }
}

pub struct StreamConnection;

enum Outcome {
    Ended,
    Failed(StreamError),
    Stopped,
    Released,
}

impl StreamConnection {
    /// Opens exactly one subscription and starts reading it in the background.
    ///
    /// Must be called within a tokio runtime.
    pub fn open(
        transport: Arc<dyn Transport>,
        request: SubscribeRequest,
        sink: Arc<dyn FrameSink>,
    ) -> ConnectionHandle {
        let handle = ConnectionHandle::new();
        let task_handle = handle.clone();

        tokio::spawn(async move {
            Self::run(transport, request, sink, task_handle).await;
        });

        handle
    }

    async fn run(
        transport: Arc<dyn Transport>,
        request: SubscribeRequest,
        sink: Arc<dyn FrameSink>,
        handle: ConnectionHandle,
    ) {
        let cancel = handle.inner.cancel.clone();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::Released,
            outcome = Self::pump(transport.as_ref(), request, sink.as_ref()) => outcome,
        };

        match outcome {
            Outcome::Ended => {
                if handle.mark_closed() {
                    debug!("watch stream completed by server");
                    sink.on_end();
                }
            }
            Outcome::Failed(error) => {
                if handle.mark_closed() {
                    warn!(%error, "watch stream failed");
                    sink.on_terminal_error(error);
                } else {
                    trace!(%error, "ignoring transport error after close");
                }
            }
            Outcome::Stopped => {
                handle.mark_closed();
            }
            Outcome::Released => {
                trace!("watch connection released by close");
            }
        }

        sink.on_released();
    }

    async fn pump(
        transport: &dyn Transport,
        request: SubscribeRequest,
        sink: &dyn FrameSink,
    ) -> Outcome {
        let mut frames = match transport.subscribe(request).await {
            Ok(frames) => frames,
            Err(error) => return Outcome::Failed(error),
        };

        while let Some(frame) = frames.next().await {
            match frame {
                Ok(frame) if is_done_marker(&frame.data) => return Outcome::Ended,
                Ok(frame) => {
                    if sink.on_message(frame).is_break() {
                        return Outcome::Stopped;
                    }
                }
                Err(error) => return Outcome::Failed(error),
            }
        }

        Outcome::Failed(StreamError::ClosedByServer)
    }
}
