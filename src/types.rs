use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Transport a probe runs over.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Tcp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one probe attempt.
///
/// `Warning` means the target answered but with an HTTP error status;
/// `Unhealthy` means nothing answered at all.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Warning,
    Unhealthy,
    Error,
}

impl ProbeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeStatus::Healthy => "healthy",
            ProbeStatus::Warning => "warning",
            ProbeStatus::Unhealthy => "unhealthy",
            ProbeStatus::Error => "error",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port as sent by callers: normally a JSON number or a numeric string.
///
/// Any other JSON value is kept as `Other` so that only TCP validation,
/// which actually needs a port, rejects it.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl PortValue {
    /// Returns the port when it is a positive integer no larger than 65535.
    pub fn to_port(&self) -> Option<u16> {
        let n = match self {
            PortValue::Number(n) => *n,
            PortValue::Text(s) => s.trim().parse::<i64>().ok()?,
            PortValue::Other(_) => return None,
        };
        u16::try_from(n).ok().filter(|p| *p > 0)
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortValue::Number(n) => write!(f, "{n}"),
            PortValue::Text(s) => write!(f, "{s:?}"),
            PortValue::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<u16> for PortValue {
    fn from(port: u16) -> Self {
        PortValue::Number(i64::from(port))
    }
}

/// Caller-supplied probe request, in its wire shape.
///
/// Every field is optional here; `probe::validate` decides what is
/// acceptable before any network activity happens.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeRequest {
    #[serde(rename = "type", default)]
    pub protocol: Option<String>,
    /// Full URL for `http`, bare host or IP for `tcp`.
    #[serde(rename = "url", default)]
    pub target: Option<String>,
    #[serde(default)]
    pub port: Option<PortValue>,
    #[serde(rename = "httpMethod", default)]
    pub method: Option<String>,
}

impl ProbeRequest {
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            protocol: Some(Protocol::Http.as_str().into()),
            target: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: Some(Protocol::Tcp.as_str().into()),
            target: Some(host.into()),
            port: Some(port.into()),
            method: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

/// Outcome of a single probe. Produced once per request and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub protocol: Protocol,
    pub status: ProbeStatus,
    pub status_code: Option<u16>,
    pub message: String,
    pub response_time_ms: u64,
    /// Transport error text, only on failure paths.
    pub error: Option<String>,
    /// Uppercased HTTP method, only when an HTTP response was received.
    pub method: Option<String>,
    /// Requested URL, only when an HTTP response was received.
    pub url: Option<String>,
}

impl ProbeResult {
    pub(crate) fn new(
        protocol: Protocol,
        status: ProbeStatus,
        message: impl Into<String>,
        response_time_ms: u64,
    ) -> Self {
        Self {
            protocol,
            status,
            status_code: None,
            message: message.into(),
            response_time_ms,
            error: None,
            method: None,
            url: None,
        }
    }

    pub(crate) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Rendered response time, e.g. `"42ms"`.
    pub fn response_time(&self) -> String {
        format!("{}ms", self.response_time_ms)
    }
}

// HTTP results always carry `statusCode` (null when nothing answered);
// TCP results never do. `Option<Option<_>>` keeps "absent" and "null" apart.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse<'a> {
    status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<Option<u16>>,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    response_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

impl<'a> From<&'a ProbeResult> for CheckResponse<'a> {
    fn from(r: &'a ProbeResult) -> Self {
        let status_code = match r.protocol {
            Protocol::Http => Some(r.status_code),
            Protocol::Tcp => None,
        };
        Self {
            status: r.status,
            status_code,
            message: &r.message,
            error: r.error.as_deref(),
            response_time: r.response_time(),
            method: r.method.as_deref(),
            url: r.url.as_deref(),
        }
    }
}

impl Serialize for ProbeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CheckResponse::from(self).serialize(serializer)
    }
}
