//! Change-stream watching for a resource collection
//!
//! Opens a long-lived server-pushed stream and exposes its change
//! notifications as an ordered, cancellable, lazily consumed
//! [`WatchStream`].
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────┐
//! │  Transport       │ HTTP GET ?watch=true (SSE / NDJSON)
//! └──────┬───────────┘
//!        │ RawFrame
//!        ▼
//! ┌──────────────────┐
//! │ StreamConnection │ read loop, [DONE] / EOF / error detection
//! └──────┬───────────┘
//!        │ on_message / on_end / on_terminal_error
//!        ▼
//! ┌──────────────────┐
//! │  WatchSession    │ decode, buffer, single-shot shutdown
//! └──────┬───────────┘ ◀── timeout / cancellation (supervisor task)
//!        │ poll_next
//!        ▼
//! ┌──────────────────┐
//! │  WatchStream     │ futures::Stream, closes on drop
//! └──────────────────┘
//! ```
//!
//! # Termination
//!
//! A session ends on the first of: explicit close, timeout, cancellation,
//! dropping the stream, transport failure, or the `[DONE]` sentinel. The
//! first trigger tears the connection down; later ones are no-ops. Caller
//! triggers discard undelivered notifications; upstream ones deliver them
//! ahead of the error (if any) and the end of the sequence.
//!
//! # Usage Example
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let cancel = CancellationToken::new();
//! let mut stream = watcher.watch(WatchOptions::default().cancellation(cancel.clone()));
//!
//! while let Some(event) = stream.next().await {
//!     match event {
//!         Ok(change) if change.is_deleted() => println!("deleted {}", change.resource_id),
//!         Ok(change) => println!("{} {}", change.kind, change.resource_id),
//!         Err(e) => eprintln!("watch failed: {e}"),
//!     }
//! }
//! ```

mod connection;
mod decoder;
mod framing;
mod resume;
mod session;
mod stream;
mod transport;
mod watcher;

pub use connection::*;
pub use decoder::*;
pub use framing::*;
pub use resume::*;
pub use session::*;
pub use stream::*;
pub use transport::*;
pub use watcher::*;

#[cfg(test)]
mod framing_test;
#[cfg(test)]
mod resume_test;
