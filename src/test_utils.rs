//! In-memory transport for exercising the client without a device.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::transport::{
    EventListener, Header, HttpResponse, Transport, TransportKind, upsert_header,
};

/// One call seen by the scripted transport
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub verb: &'static str,
    pub url: String,
    pub body: Option<String>,
    /// Per-request headers
    pub headers: Vec<Header>,
    /// Options attached to the transport when the call was made
    pub options: Vec<Header>,
}

impl RecordedRequest {
    fn json(&self) -> Value {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
            .unwrap_or(Value::Null)
    }

    /// JSON-RPC method name of a POST
    pub fn rpc_method(&self) -> Option<String> {
        self.json()
            .get("method")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
    }

    pub fn rpc_version(&self) -> Option<String> {
        self.json()
            .get("version")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
    }

    pub fn params(&self) -> Value {
        self.json().get("params").cloned().unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Matcher {
    Rpc { method: String, params: Option<Value> },
    Get { url_prefix: String },
}

impl Matcher {
    fn matches(&self, request: &RecordedRequest) -> bool {
        match self {
            Matcher::Rpc { method, params } => {
                request.verb == "POST"
                    && request.rpc_method().as_deref() == Some(method.as_str())
                    && params.as_ref().is_none_or(|p| *p == request.params())
            }
            Matcher::Get { url_prefix } => {
                request.verb == "GET" && request.url.starts_with(url_prefix.as_str())
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Respond(HttpResponse),
    Panic,
}

/// Answers queued for a matcher. The last answer repeats once the queue drains.
struct Rule {
    matcher: Matcher,
    replies: VecDeque<Reply>,
}

/// Transport answering from a list of scripted rules. Unmatched calls get a
/// 404. Every call is recorded along with the options attached at the time.
pub struct ScriptedTransport {
    rules: Mutex<Vec<Rule>>,
    requests: Mutex<Vec<RecordedRequest>>,
    options: Mutex<Vec<Header>>,
    listeners: Mutex<Vec<Arc<dyn EventListener>>>,
    kind: TransportKind,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::with_kind(TransportKind::HttpPost)
    }

    pub fn with_kind(kind: TransportKind) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            kind,
        }
    }

    /// Answer a JSON-RPC method. Repeated calls queue further answers.
    pub fn on_rpc(&self, method: &str, response: HttpResponse) {
        self.push(
            Matcher::Rpc {
                method: method.to_string(),
                params: None,
            },
            Reply::Respond(response),
        );
    }

    /// Answer a JSON-RPC method only when called with exactly these params
    pub fn on_rpc_params(&self, method: &str, params: Value, response: HttpResponse) {
        self.push(
            Matcher::Rpc {
                method: method.to_string(),
                params: Some(params),
            },
            Reply::Respond(response),
        );
    }

    /// Panic when the method is called, simulating a failing probe
    pub fn panic_on_rpc(&self, method: &str) {
        self.push(
            Matcher::Rpc {
                method: method.to_string(),
                params: None,
            },
            Reply::Panic,
        );
    }

    /// Answer GET requests whose URL starts with the prefix
    pub fn on_get(&self, url_prefix: &str, response: HttpResponse) {
        self.push(
            Matcher::Get {
                url_prefix: url_prefix.to_string(),
            },
            Reply::Respond(response),
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded POSTs for one JSON-RPC method
    pub fn rpc_calls(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.rpc_method().as_deref() == Some(method))
            .collect()
    }

    pub fn gets(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.verb == "GET")
            .collect()
    }

    fn push(&self, matcher: Matcher, reply: Reply) {
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|r| r.matcher == matcher) {
            Some(rule) => rule.replies.push_back(reply),
            None => rules.push(Rule {
                matcher,
                replies: VecDeque::from([reply]),
            }),
        }
    }

    fn answer(&self, request: RecordedRequest) -> HttpResponse {
        self.requests.lock().unwrap().push(request.clone());

        let reply = {
            let mut rules = self.rules.lock().unwrap();
            // Parameter-specific rules win over method-wide ones
            let index = rules
                .iter()
                .position(|r| {
                    matches!(&r.matcher, Matcher::Rpc { params: Some(_), .. })
                        && r.matcher.matches(&request)
                })
                .or_else(|| rules.iter().position(|r| r.matcher.matches(&request)));
            index.and_then(|i| {
                let replies = &mut rules[i].replies;
                if replies.len() > 1 {
                    replies.pop_front()
                } else {
                    replies.front().cloned()
                }
            })
        };

        match reply {
            Some(Reply::Respond(response)) => response,
            Some(Reply::Panic) => panic!("scripted failure for {}", request.url),
            None => HttpResponse::new(404, "Not Found"),
        }
    }
}

impl Transport for ScriptedTransport {
    fn execute_get(&self, url: &str, headers: &[Header]) -> HttpResponse {
        let options = self.options();
        self.answer(RecordedRequest {
            verb: "GET",
            url: url.to_string(),
            body: None,
            headers: headers.to_vec(),
            options,
        })
    }

    fn execute_post_json(&self, url: &str, body: &str, headers: &[Header]) -> HttpResponse {
        let options = self.options();
        self.answer(RecordedRequest {
            verb: "POST",
            url: url.to_string(),
            body: Some(body.to_string()),
            headers: headers.to_vec(),
            options,
        })
    }

    fn set_option(&self, header: Header) {
        upsert_header(&mut self.options.lock().unwrap(), header);
    }

    fn remove_option(&self, header: &Header) {
        self.options.lock().unwrap().retain(|h| h != header);
    }

    fn options(&self) -> Vec<Header> {
        self.options.lock().unwrap().clone()
    }

    fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn kind(&self) -> TransportKind {
        self.kind.clone()
    }
}

/// 200 response carrying `{"id": 1, "result": <results>}`
pub fn result(results: Value) -> HttpResponse {
    HttpResponse::new(200, json!({ "id": 1, "result": results }).to_string())
}

/// 200 response carrying `{"id": 1, "error": [code, description]}`
pub fn device_error(code: i64, description: &str) -> HttpResponse {
    HttpResponse::new(200, json!({ "id": 1, "error": [code, description] }).to_string())
}
