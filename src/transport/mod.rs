//! Transport contract consumed by the client. The core only talks to the
//! device through `Transport`; `HttpTransport` is the default blocking
//! implementation used by the command line tool.

mod http;

pub use http::HttpTransport;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single HTTP header used either per request or as a transport option
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Raw status and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const SERVICE_UNAVAILABLE: u16 = 503;

    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Self::OK
    }

    /// Canonical reason phrase for the status, empty if unknown
    pub fn reason(&self) -> &'static str {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
    }

    /// "<status> - <body>", falling back to the reason phrase for an empty body
    pub fn describe(&self) -> String {
        if self.body.trim().is_empty() {
            format!("{} - {}", self.status, self.reason())
        } else {
            format!("{} - {}", self.status, self.body)
        }
    }
}

/// How a method can be reached on the device, as advertised by the device
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransportKind {
    HttpPost,
    WebSocket,
    Other(String),
}

impl TransportKind {
    pub const HTTP_POST: &'static str = "xhrpost:jsonizer";
    pub const WEBSOCKET: &'static str = "websocket:jsonizer";

    pub fn as_str(&self) -> &str {
        match self {
            TransportKind::HttpPost => Self::HTTP_POST,
            TransportKind::WebSocket => Self::WEBSOCKET,
            TransportKind::Other(s) => s,
        }
    }
}

impl From<String> for TransportKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            Self::HTTP_POST => TransportKind::HttpPost,
            Self::WEBSOCKET => TransportKind::WebSocket,
            _ => TransportKind::Other(s),
        }
    }
}

impl From<&str> for TransportKind {
    fn from(s: &str) -> Self {
        TransportKind::from(s.to_string())
    }
}

impl From<TransportKind> for String {
    fn from(kind: TransportKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type TransportKinds = BTreeSet<TransportKind>;

/// Asynchronous notification pushed by the device (WebSocket transports only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEvent {
    pub method: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub params: Vec<Value>,
}

pub trait EventListener: Send + Sync {
    fn event_received(&self, event: &ScalarEvent);
}

/// Executes requests against one device and carries the headers applied to
/// every subsequent call ("options").
///
/// Implementations never fail at this level: connection errors and timeouts
/// are reported as a synthetic 500 response with the error text as body.
pub trait Transport: Send + Sync {
    fn execute_get(&self, url: &str, headers: &[Header]) -> HttpResponse;

    fn execute_post_json(&self, url: &str, body: &str, headers: &[Header]) -> HttpResponse;

    /// Attach a header to all subsequent calls, replacing one with the same name
    fn set_option(&self, header: Header);

    /// Detach a previously attached header (exact match)
    fn remove_option(&self, header: &Header);

    /// Headers currently attached
    fn options(&self) -> Vec<Header>;

    fn add_listener(&self, listener: Arc<dyn EventListener>);

    fn kind(&self) -> TransportKind;
}

/// Attaches a header for the lifetime of the guard. The header is detached
/// when the guard is dropped, including during unwinding, and any same-name
/// option it replaced is attached again.
pub struct OptionGuard<'a> {
    transport: &'a dyn Transport,
    header: Header,
    replaced: Option<Header>,
}

impl<'a> OptionGuard<'a> {
    pub fn attach(transport: &'a dyn Transport, header: Header) -> Self {
        let replaced = transport
            .options()
            .into_iter()
            .find(|h| h.name.eq_ignore_ascii_case(&header.name));
        transport.set_option(header.clone());
        Self {
            transport,
            header,
            replaced,
        }
    }
}

impl Drop for OptionGuard<'_> {
    fn drop(&mut self) {
        self.transport.remove_option(&self.header);
        if let Some(previous) = self.replaced.take() {
            self.transport.set_option(previous);
        }
    }
}

/// Header list maintenance shared by transport implementations
pub(crate) fn upsert_header(options: &mut Vec<Header>, header: Header) {
    options.retain(|h| !h.name.eq_ignore_ascii_case(&header.name));
    options.push(header);
}
