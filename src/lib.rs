//! Library crate for portal-probe: the reachability probing engine and the
//! API surfaces built around it.
pub mod catalog;
pub mod error;
pub mod probe;
pub mod server;
pub mod sweep;
pub mod types;

pub use error::ValidationError;
pub use probe::{probe, PROBE_TIMEOUT};
pub use types::{ProbeRequest, ProbeResult, ProbeStatus, Protocol};
