//! JSON-RPC envelope spoken by the device's `/sony/<service>` endpoints.

pub mod codes;
mod outcome;
mod request;

pub use codes::{ErrorDisposition, classify};
pub use outcome::{Outcome, Payload};
pub use request::{RequestIds, ScalarRequest};

use crate::transport::{Header, HttpResponse, Transport};

/// Well known service names
pub mod service {
    pub const ACCESS_CONTROL: &str = "accessControl";
    pub const GUIDE: &str = "guide";
    pub const SYSTEM: &str = "system";
}

/// Well known method names
pub mod method {
    pub const ACT_REGISTER: &str = "actRegister";
    pub const GET_SUPPORTED_API_INFO: &str = "getSupportedApiInfo";
    pub const GET_VERSIONS: &str = "getVersions";
    pub const GET_METHOD_TYPES: &str = "getMethodTypes";
    pub const SWITCH_NOTIFICATIONS: &str = "switchNotifications";
    pub const GET_DEVICE_MODE: &str = "getDeviceMode";
    pub const GET_POWER_STATUS: &str = "getPowerStatus";
}

pub const V1_0: &str = "1.0";

/// Result of posting one request: the classified outcome plus the raw exchange
#[derive(Debug, Clone)]
pub struct Exchange {
    pub outcome: Outcome,
    pub response: HttpResponse,
}

/// Post a request to a service URL and classify the answer
pub fn post(
    transport: &dyn Transport,
    url: &str,
    request: &ScalarRequest,
    headers: &[Header],
) -> Exchange {
    let body = match serde_json::to_string(request) {
        Ok(body) => body,
        Err(e) => {
            let response = HttpResponse::new(
                HttpResponse::INTERNAL_SERVER_ERROR,
                format!("Could not serialize {}: {}", request.method, e),
            );
            return Exchange {
                outcome: Outcome::from_response(&response),
                response,
            };
        }
    };

    tracing::trace!("POST {} {}", url, body);
    let response = transport.execute_post_json(url, &body, headers);
    let outcome = Outcome::from_response(&response);
    tracing::trace!("{} {} -> {}", url, request.method, outcome.describe());
    Exchange { outcome, response }
}
