//! Reconciler error types.

use std::time::Duration;

use thiserror::Error;

use crate::clients::ClientError;

/// Errors surfaced by the refresher, waiter and reconciler.
#[derive(Debug, Error)]
pub enum Error {
    /// A provider call failed for a reason other than "not found".
    #[error("{operation} virtual interface {id}: {source}")]
    Client {
        operation: &'static str,
        id: String,
        #[source]
        source: ClientError,
    },

    /// The provider reported a state outside the expected vocabulary.
    #[error("unexpected state '{state}', wanted target {target:?}")]
    UnexpectedState { state: String, target: Vec<String> },

    /// The target state was not reached before the deadline.
    #[error(
        "timeout while waiting for state to become {target:?} (last state: '{last_state}', elapsed: {elapsed:?})"
    )]
    Timeout {
        last_state: String,
        target: Vec<String>,
        elapsed: Duration,
    },

    /// The resource stayed absent for too many consecutive probes.
    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    /// The wait was cancelled by shutdown.
    #[error("wait cancelled (last state: '{last_state}')")]
    Cancelled { last_state: String },

    #[error("virtual interface already created: {0}")]
    AlreadyCreated(String),

    #[error("local record has no virtual interface id")]
    MissingId,

    #[error("provider returned an empty virtual interface id")]
    EmptyId,
}

impl Error {
    pub(crate) fn client(operation: &'static str, id: impl Into<String>, source: ClientError) -> Self {
        Error::Client {
            operation,
            id: id.into(),
            source,
        }
    }
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;
