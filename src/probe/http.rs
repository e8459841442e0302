use std::error::Error as StdError;
use std::time::Duration;

use reqwest::{redirect, Client, Method, Url};
use tokio::time::{self, Instant};
use tracing::debug;

use super::elapsed_ms;
use crate::types::{ProbeResult, ProbeStatus, Protocol};

const USER_AGENT: &str = concat!("portal-probe/", env!("CARGO_PKG_VERSION"));

/// Issue one request against `url` and classify the response status.
///
/// - Transport failures (DNS, refused, TLS) resolve to `unhealthy` with the error text.
/// - If no response headers arrive within `timeout`, the request future is
///   dropped (which aborts the connection) and the result is `unhealthy`/timed out.
/// - Any HTTP status at all means the server is alive: `healthy` or `warning`.
pub(super) async fn probe_http(url: &str, method: &Method, timeout: Duration) -> ProbeResult {
    let start = Instant::now();

    let parsed = match parse_url(url) {
        Ok(u) => u,
        Err(e) => {
            debug!(%url, error = %e, "http probe rejected url");
            return ProbeResult::new(
                Protocol::Http,
                ProbeStatus::Error,
                "invalid url",
                elapsed_ms(start),
            )
            .with_error(e);
        }
    };

    let client = match build_client() {
        Ok(c) => c,
        Err(e) => {
            return ProbeResult::new(
                Protocol::Http,
                ProbeStatus::Error,
                "probe setup failed",
                elapsed_ms(start),
            )
            .with_error(error_chain(&e));
        }
    };

    let send = client.request(method.clone(), parsed).send();
    match time::timeout(timeout, send).await {
        Ok(Ok(response)) => {
            let latency_ms = elapsed_ms(start);
            let code = response.status().as_u16();
            // Body is never read; dropping releases the connection.
            drop(response);
            let (status, message) = classify(code);
            debug!(%url, %method, code, latency_ms, "http probe answered");
            let mut result = ProbeResult::new(Protocol::Http, status, message, latency_ms);
            result.status_code = Some(code);
            result.method = Some(method.as_str().to_string());
            result.url = Some(url.to_string());
            result
        }
        Ok(Err(e)) => {
            let latency_ms = elapsed_ms(start);
            let error = error_chain(&e);
            debug!(%url, %error, latency_ms, "http probe could not connect");
            ProbeResult::new(
                Protocol::Http,
                ProbeStatus::Unhealthy,
                "could not connect",
                latency_ms,
            )
            .with_error(error)
        }
        Err(_) => {
            let latency_ms = elapsed_ms(start);
            debug!(%url, latency_ms, "http probe timed out");
            ProbeResult::new(Protocol::Http, ProbeStatus::Unhealthy, "timed out", latency_ms)
        }
    }
}

/// Map an HTTP status code onto the probe taxonomy.
///
/// Anything outside 200..=499 lands in the server-error bucket, 1xx included.
pub(super) fn classify(code: u16) -> (ProbeStatus, String) {
    match code {
        200..=399 => (ProbeStatus::Healthy, "operational".to_string()),
        400..=499 => (ProbeStatus::Warning, format!("client error ({code})")),
        _ => (ProbeStatus::Warning, format!("server error ({code})")),
    }
}

fn parse_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("{e}: {raw}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported url scheme: {other}")),
    }
}

// One client per probe: no idle connections survive the call.
fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
}

/// reqwest's top-level message hides the cause; join the whole source chain.
fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn classify_status_classes() {
        assert_eq!(classify(200).0, ProbeStatus::Healthy);
        assert_eq!(classify(204).1, "operational");
        assert_eq!(classify(301).0, ProbeStatus::Healthy);
        assert_eq!(classify(399).0, ProbeStatus::Healthy);
        assert_eq!(classify(404), (ProbeStatus::Warning, "client error (404)".into()));
        assert_eq!(classify(503), (ProbeStatus::Warning, "server error (503)".into()));
        assert_eq!(classify(101), (ProbeStatus::Warning, "server error (101)".into()));
    }

    #[test]
    fn parse_url_accepts_http_and_https_only() {
        assert!(parse_url("http://localhost:8080/health?x=1").is_ok());
        assert!(parse_url("https://example.test").is_ok());
        assert!(parse_url("ftp://example.test").unwrap_err().contains("ftp"));
        assert!(parse_url("not a url").is_err());
    }

    #[tokio::test]
    async fn malformed_url_resolves_with_error_status() {
        let r = probe_http("::::", &Method::HEAD, Duration::from_secs(5)).await;
        assert_eq!(r.status, ProbeStatus::Error);
        assert_eq!(r.message, "invalid url");
        assert!(r.error.is_some());
        assert_eq!(r.status_code, None);
        assert!(r.response_time_ms < 1000);
    }

    #[tokio::test]
    async fn silent_server_times_out_without_error_text() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering.
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let url = format!("http://{addr}/");
        let r = probe_http(&url, &Method::GET, Duration::from_millis(300)).await;
        holder.abort();

        assert_eq!(r.status, ProbeStatus::Unhealthy);
        assert_eq!(r.message, "timed out");
        assert_eq!(r.error, None);
        assert_eq!(r.status_code, None);
        assert!(r.response_time_ms >= 300 && r.response_time_ms < 1500);
    }

    #[test]
    fn error_chain_includes_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "inner cause");
        let outer = std::io::Error::new(std::io::ErrorKind::Other, io);
        assert!(error_chain(&outer).contains("inner cause"));
    }
}
