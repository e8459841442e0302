//! Probe dispatcher.
//!
//! Validates a [`ProbeRequest`], selects the prober for its protocol and
//! returns the prober's [`ProbeResult`] untouched. The probers themselves
//! are private; this module is the only entry point.
//!
//! Every probe is independent: no shared state, no pooling, no retries.
//! Each prober enforces [`PROBE_TIMEOUT`] on its own transport call, so
//! `probe` always resolves within that bound.
mod http;
mod tcp;

use std::time::Duration;

use reqwest::Method;
use tokio::time::Instant;

use crate::error::ValidationError;
use crate::types::{ProbeRequest, ProbeResult, Protocol};

/// Fixed per-attempt deadline for both protocols.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Method used for HTTP probes when the request does not name one.
pub const DEFAULT_HTTP_METHOD: &str = "HEAD";

/// A validated probe target, tagged by protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Http { url: String, method: Method },
    Tcp { host: String, port: u16 },
}

impl Target {
    pub fn protocol(&self) -> Protocol {
        match self {
            Target::Http { .. } => Protocol::Http,
            Target::Tcp { .. } => Protocol::Tcp,
        }
    }

    async fn run(&self, timeout: Duration) -> ProbeResult {
        match self {
            Target::Http { url, method } => http::probe_http(url, method, timeout).await,
            Target::Tcp { host, port } => tcp::probe_tcp(host, *port, timeout).await,
        }
    }
}

/// Check a request's shape without touching the network.
pub fn validate(request: &ProbeRequest) -> Result<Target, ValidationError> {
    let protocol = match request.protocol.as_deref() {
        None | Some("") => return Err(ValidationError::MissingProtocol),
        Some("http") => Protocol::Http,
        Some("tcp") => Protocol::Tcp,
        Some(other) => return Err(ValidationError::UnknownProtocol(other.to_string())),
    };

    let target = request
        .target
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or(ValidationError::MissingTarget)?;

    match protocol {
        Protocol::Http => Ok(Target::Http {
            url: target.to_string(),
            method: parse_method(request.method.as_deref())?,
        }),
        Protocol::Tcp => {
            let raw = request.port.as_ref().ok_or(ValidationError::MissingPort)?;
            let port = raw
                .to_port()
                .ok_or_else(|| ValidationError::InvalidPort(raw.to_string()))?;
            Ok(Target::Tcp {
                host: target.trim().to_string(),
                port,
            })
        }
    }
}

/// Validate `request`, then run exactly one probe against it.
///
/// Reachability failures come back as `Ok` results with an `unhealthy`
/// or `warning` status; only malformed requests produce `Err`.
pub async fn probe(request: &ProbeRequest) -> Result<ProbeResult, ValidationError> {
    let target = validate(request)?;
    Ok(target.run(PROBE_TIMEOUT).await)
}

fn parse_method(raw: Option<&str>) -> Result<Method, ValidationError> {
    let raw = raw
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_HTTP_METHOD);
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| ValidationError::InvalidMethod(raw.to_string()))
}

/// Wall-clock milliseconds since `start`, rounded to the nearest millisecond.
fn elapsed_ms(start: Instant) -> u64 {
    (start.elapsed().as_secs_f64() * 1000.0).round() as u64
}
