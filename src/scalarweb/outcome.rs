use serde_json::Value;

use super::codes::{self, ErrorDisposition};
use crate::transport::HttpResponse;

/// Successful answer of a call
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The `result` array returned by the device
    Results(Vec<Value>),
    /// The method is absent on this firmware; nothing was sent
    Unsupported(String),
}

/// Uniform result of one device call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Payload),
    DeviceError { code: i64, description: String },
    TransportError { status: u16, body: String },
}

impl Outcome {
    /// Sentinel returned for a method the device does not list
    pub fn not_implemented(method: &str) -> Self {
        Outcome::Success(Payload::Unsupported(method.to_string()))
    }

    /// Classify a raw HTTP exchange
    pub fn from_response(response: &HttpResponse) -> Self {
        if !response.is_ok() {
            return Outcome::TransportError {
                status: response.status,
                body: response.body.clone(),
            };
        }

        let json: Value = match serde_json::from_str(&response.body) {
            Ok(v) => v,
            Err(e) => {
                return Outcome::TransportError {
                    status: HttpResponse::INTERNAL_SERVER_ERROR,
                    body: format!("Unparsable response ({}): {}", e, response.body),
                };
            }
        };

        if let Some(errors) = json.get("error").and_then(|e| e.as_array())
            && !errors.is_empty()
        {
            return Self::device_error(errors);
        }

        match json.get("result") {
            Some(Value::Array(results)) => Outcome::Success(Payload::Results(results.clone())),
            Some(Value::Null) | None if json.get("id").is_some() => {
                Outcome::Success(Payload::Results(Vec::new()))
            }
            _ => Outcome::TransportError {
                status: HttpResponse::INTERNAL_SERVER_ERROR,
                body: format!("Unexpected response: {}", response.body),
            },
        }
    }

    fn device_error(errors: &[Value]) -> Self {
        let code = match &errors[0] {
            Value::Number(n) => n.as_i64().unwrap_or(codes::UNKNOWN),
            Value::String(s) => s.trim().parse().unwrap_or(codes::UNKNOWN),
            _ => codes::UNKNOWN,
        };
        let description = errors[1..]
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        Outcome::DeviceError { code, description }
    }

    /// Status the call is judged by: 200 on success, 500 when the device
    /// reported an error, the real status for a failed exchange
    pub fn status(&self) -> u16 {
        match self {
            Outcome::Success(_) => HttpResponse::OK,
            Outcome::DeviceError { .. } => HttpResponse::INTERNAL_SERVER_ERROR,
            Outcome::TransportError { status, .. } => *status,
        }
    }

    /// Device error code; `NONE` on success, `HTTP_ERROR` for a failed exchange
    pub fn error_code(&self) -> i64 {
        match self {
            Outcome::Success(_) => codes::NONE,
            Outcome::DeviceError { code, .. } => *code,
            Outcome::TransportError { .. } => codes::HTTP_ERROR,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(Payload::Results(_)))
    }

    /// True for the not-implemented sentinel and for a device `NOT_IMPLEMENTED`
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Outcome::Success(Payload::Unsupported(_)))
            || self.error_code() == codes::NOT_IMPLEMENTED
    }

    pub fn results(&self) -> Option<&[Value]> {
        match self {
            Outcome::Success(Payload::Results(results)) => Some(results),
            _ => None,
        }
    }

    /// `None` for success (including the unsupported sentinel)
    pub fn disposition(&self) -> Option<ErrorDisposition> {
        match self {
            Outcome::Success(_) => None,
            _ => Some(codes::classify(self.error_code())),
        }
    }

    /// Body text for reporting: the device description or the HTTP body
    pub fn body(&self) -> String {
        match self {
            Outcome::Success(Payload::Results(results)) => Value::Array(results.clone()).to_string(),
            Outcome::Success(Payload::Unsupported(method)) => {
                format!("{} is not implemented", method)
            }
            Outcome::DeviceError { description, .. } => description.clone(),
            Outcome::TransportError { body, .. } => body.clone(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Outcome::Success(Payload::Results(results)) => format!("ok ({} results)", results.len()),
            Outcome::Success(Payload::Unsupported(method)) => format!("{} not implemented", method),
            Outcome::DeviceError { code, description } => {
                format!("{} ({}): {}", codes::describe(*code), code, description)
            }
            Outcome::TransportError { status, body } => format!("http {}: {}", status, body),
        }
    }

    /// The outcome as an HTTP status/body pair
    pub fn to_response(&self) -> HttpResponse {
        HttpResponse::new(self.status(), self.body())
    }
}
