//! Streaming transport abstraction
//!
//! A [`Transport`] opens one long-lived subscription and hands back the
//! response body already split into [`RawFrame`]s. The watch core never sees
//! HTTP; tests plug in a scripted transport instead.

use std::fmt::Debug;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
#[cfg(test)]
use mockall::automock;
use reqwest::header::ACCEPT;
use reqwest::header::CACHE_CONTROL;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use super::framing::FrameParser;
use super::framing::RawFrame;
use crate::config::redact;
use crate::constants::EVENT_STREAM_MEDIA_TYPE;
use crate::constants::LAST_EVENT_ID_HEADER;
use crate::constants::PROJECT_HEADER;
use crate::Error;
use crate::StreamError;

/// Frames of one open subscription. Ends when the response body ends.
pub type FrameStream = Pin<Box<dyn Stream<Item = std::result::Result<RawFrame, StreamError>> + Send>>;

/// Everything needed to open one subscription
#[derive(Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub url: Url,
    pub bearer_token: Option<String>,
    pub project: Option<String>,
    /// Sent as `Last-Event-ID` when resuming
    pub resume_token: Option<String>,
}

impl Debug for SubscribeRequest {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SubscribeRequest")
            .field("url", &self.url.as_str())
            .field("bearer_token", &self.bearer_token.as_deref().map(redact))
            .field("project", &self.project)
            .field("resume_token", &self.resume_token)
            .finish()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens the subscription.
    ///
    /// Fails with [`StreamError::Connect`] when the request cannot be sent and
    /// [`StreamError::Status`] on a non-success response. Failures while
    /// reading the body are yielded through the returned stream.
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> std::result::Result<FrameStream, StreamError>;
}

/// [`Transport`] over HTTP(S), speaking Server-Sent Events or NDJSON
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(Error::HttpClient)?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> std::result::Result<FrameStream, StreamError> {
        debug!(?request, "opening watch subscription");

        let mut builder = self
            .client
            .get(request.url.clone())
            .header(ACCEPT, EVENT_STREAM_MEDIA_TYPE)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(ref token) = request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref project) = request.project {
            builder = builder.header(PROJECT_HEADER, project);
        }
        if let Some(ref resume_token) = request.resume_token {
            builder = builder.header(LAST_EVENT_ID_HEADER, resume_token);
        }

        let response = builder.send().await.map_err(StreamError::connect)?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.text().await {
                Ok(body) if !body.trim().is_empty() => body.trim().to_string(),
                _ => status.canonical_reason().unwrap_or("request failed").to_string(),
            };
            return Err(StreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut parser = FrameParser::for_content_type(content_type.as_deref());
        let mut body = response.bytes_stream();

        let frames = async_stream::stream! {
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        for frame in parser.feed(&bytes) {
                            yield Ok(frame);
                        }
                    }
                    Err(e) => {
                        yield Err(StreamError::disconnected(e));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(frames))
    }
}
