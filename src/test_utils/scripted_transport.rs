use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use url::Url;

use crate::watch::FrameStream;
use crate::watch::RawFrame;
use crate::watch::SubscribeRequest;
use crate::watch::SubscriptionTarget;
use crate::watch::Transport;
use crate::StreamError;

type FrameResult = std::result::Result<RawFrame, StreamError>;

enum Script {
    Stream(mpsc::UnboundedReceiver<FrameResult>),
    Fail(StreamError),
}

/// Transport serving scripted subscriptions in order.
///
/// Each `subscribe` consumes the next script. Once the scripts run out the
/// subscription stays open and silent.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<SubscribeRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a subscription whose frames are pushed through the returned feed
    pub fn push_stream(&self) -> FrameFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().push_back(Script::Stream(rx));
        FrameFeed { tx }
    }

    /// Queues a subscription that fails to open
    pub fn push_failure(
        &self,
        error: StreamError,
    ) {
        self.scripts.lock().push_back(Script::Fail(error));
    }

    pub fn subscribe_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<SubscribeRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> std::result::Result<FrameStream, StreamError> {
        self.requests.lock().push(request);

        let script = self.scripts.lock().pop_front();
        match script {
            Some(Script::Stream(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            Some(Script::Fail(error)) => Err(error),
            None => Ok(futures::stream::pending::<FrameResult>().boxed()),
        }
    }
}

/// Producer side of one scripted subscription.
///
/// Dropping the feed ends the response body without the sentinel.
pub struct FrameFeed {
    tx: mpsc::UnboundedSender<FrameResult>,
}

impl FrameFeed {
    /// Pushes a frame; returns false once the subscription was released
    pub fn send(
        &self,
        data: impl Into<String>,
    ) -> bool {
        self.tx.send(Ok(RawFrame::new(data))).is_ok()
    }

    pub fn send_with_id(
        &self,
        data: impl Into<String>,
        id: impl Into<String>,
    ) -> bool {
        self.tx.send(Ok(RawFrame::with_id(data, id))).is_ok()
    }

    pub fn done(&self) -> bool {
        self.send("[DONE]")
    }

    pub fn fail(
        &self,
        error: StreamError,
    ) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// Whether the consumer side (the connection) has been dropped
    pub fn is_released(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn released(&self) {
        self.tx.closed().await
    }
}

pub fn test_target() -> SubscriptionTarget {
    SubscriptionTarget {
        url: Url::parse("http://localhost:8080/api/ambient/v1/sessions?watch=true").unwrap(),
        bearer_token: Some("test-token".to_string()),
        project: Some("test-project".to_string()),
    }
}
