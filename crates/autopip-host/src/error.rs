//! Error types for the host boundary.

use thiserror::Error;

/// Reason a PiP request was refused by the host.
///
/// The actuator does not branch on the variant; every rejection drives the
/// same backoff path and is only reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipRejection {
    #[error("no qualifying user activation")]
    NotAllowed,

    #[error("picture-in-picture not supported: {0}")]
    NotSupported(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("blocked by security policy")]
    Security,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("subscribe to {topic} failed: {detail}")]
    Subscribe { topic: String, detail: String },

    #[error("metadata advertisement rejected: {0}")]
    Metadata(String),

    #[error("playback request failed: {0}")]
    Playback(String),
}
