use thiserror::Error;

/// A probe request rejected before any network activity.
///
/// These are caller faults, disjoint from probe outcomes: an unreachable
/// target is a `ProbeResult`, never a `ValidationError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("check type not specified")]
    MissingProtocol,

    #[error("invalid check type: {0}")]
    UnknownProtocol(String),

    #[error("target url/host not specified")]
    MissingTarget,

    #[error("tcp checks require a port")]
    MissingPort,

    #[error("invalid tcp port: {0}")]
    InvalidPort(String),

    #[error("invalid http method: {0}")]
    InvalidMethod(String),
}
