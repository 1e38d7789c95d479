//! Client for watching a resource collection's change stream.
//!
//! See [`WatchClient`] for the entry point and [`watch`] for the session
//! machinery behind it.

mod client;
mod config;
mod constants;
mod errors;
mod metrics;
mod types;
pub mod watch;

pub use client::*;
pub use self::config::*;
pub(crate) use errors::config_error;
pub use errors::Error;
pub use errors::Result;
pub use errors::StreamError;
pub use metrics::*;
pub use types::*;
pub use watch::ChangeWatcher;
pub use watch::HttpTransport;
pub use watch::Lifecycle;
pub use watch::ShutdownReason;
pub use watch::SubscriptionTarget;
pub use watch::Transport;
pub use watch::WatchHandle;
pub use watch::WatchStream;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
