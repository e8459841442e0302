use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::debug;

use super::elapsed_ms;
use crate::types::{ProbeResult, ProbeStatus, Protocol};

/// Attempt one TCP connect to `host:port` bounded by `timeout`.
///
/// Name resolution happens inside the same deadline. On success the
/// stream is closed straight away; nothing is written or read.
pub(super) async fn probe_tcp(host: &str, port: u16, timeout: Duration) -> ProbeResult {
    let start = Instant::now();
    // Bracketed IPv6 literals come from URL-style input.
    let host = host.trim_start_matches('[').trim_end_matches(']');

    match time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            let latency_ms = elapsed_ms(start);
            drop(stream);
            debug!(%host, port, latency_ms, "tcp probe connected");
            ProbeResult::new(Protocol::Tcp, ProbeStatus::Healthy, "port open", latency_ms)
        }
        Ok(Err(e)) => {
            let latency_ms = elapsed_ms(start);
            debug!(%host, port, error = %e, latency_ms, "tcp probe could not connect");
            ProbeResult::new(
                Protocol::Tcp,
                ProbeStatus::Unhealthy,
                "could not connect",
                latency_ms,
            )
            .with_error(e.to_string())
        }
        Err(_) => {
            let latency_ms = elapsed_ms(start);
            debug!(%host, port, latency_ms, "tcp probe timed out");
            ProbeResult::new(Protocol::Tcp, ProbeStatus::Unhealthy, "timed out", latency_ms)
        }
    }
}
