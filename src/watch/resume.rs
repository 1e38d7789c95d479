//! Reconnect-with-resume policy layered over the watch core.
//!
//! The core treats every transport failure as terminal. This module re-invokes
//! `watch` after retryable failures, continuing from the last event id the
//! previous session saw.

use std::sync::Arc;

use futures::Stream;
use futures::StreamExt;
use tokio::time::sleep;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::BackoffPolicy;
use crate::ChangeNotification;
use crate::StreamError;
use crate::WatchClient;
use crate::WatchOptions;

/// Watches with automatic resume.
///
/// - retryable errors reconnect after [`BackoffPolicy::delay_for`], passing
///   the last seen resume token
/// - every delivered notification resets the retry budget
/// - non-retryable errors, or running out of retries, surface the last error
///   and end the stream
/// - a clean end (timeout, cancellation, close, `[DONE]`) ends the stream
///
/// The timeout in `options` (or the client default) bounds the whole resumed
/// watch, not each reconnect.
pub fn resume_watch(
    client: Arc<WatchClient>,
    options: WatchOptions,
    policy: BackoffPolicy,
) -> impl Stream<Item = std::result::Result<ChangeNotification, StreamError>> + Send {
    async_stream::stream! {
        let timeout = options
            .timeout
            .or_else(|| client.config().watch.default_timeout());
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let cancellation = options.cancellation.clone();
        let mut resume_token = options.resume_token.clone();
        let mut failures: usize = 0;

        loop {
            let attempt = WatchOptions {
                resume_token: resume_token.clone(),
                timeout: match deadline {
                    Some(d) => Some(d.saturating_duration_since(Instant::now())),
                    None => timeout,
                },
                cancellation: cancellation.clone(),
            };

            let mut stream = client.watch(attempt);
            let mut last_error = None;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(notification) => {
                        failures = 0;
                        yield Ok(notification);
                    }
                    Err(error) => last_error = Some(error),
                }
            }
            if let Some(token) = stream.resume_token() {
                resume_token = Some(token);
            }
            drop(stream);

            let Some(error) = last_error else {
                debug!("resumed watch ended cleanly");
                return;
            };

            if !error.is_retryable() || !policy.allows(failures) {
                warn!(%error, failures, "watch not resumable, giving up");
                yield Err(error);
                return;
            }

            let delay = policy.delay_for(failures as u32);
            failures += 1;
            warn!(
                %error,
                attempt = failures,
                ?delay,
                resume_token = resume_token.as_deref().unwrap_or(""),
                "watch failed, resuming"
            );

            let proceed = tokio::select! {
                _ = sleep(delay) => true,
                _ = wait_deadline(deadline) => false,
                _ = wait_cancelled(cancellation.clone()) => false,
            };
            if !proceed {
                debug!("resumed watch ended during backoff");
                return;
            }
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_cancelled(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
