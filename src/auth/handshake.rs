//! Pairing and renewal against the device's `accessControl` service, with
//! the legacy registration URL as fallback.
//!
//! Every attempt is independent: a `PairingSession` is built per call and
//! the handshake never retries on its own beyond the single legacy fallback
//! and its one alternate registration type.

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use super::headers::{access_code_header, basic_auth_header, device_id_header};
use crate::config::DeviceIdentity;
use crate::dispatcher::CommandDispatcher;
use crate::scalarweb::{Outcome, V1_0, codes, method, service};
use crate::transport::{Header, HttpResponse, OptionGuard};

/// Terminal result of one pairing attempt or access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    Ok,
    NeedsPairing,
    ServiceMissing,
    DisplayOff,
    HomeMenuRequired,
    /// A code was requested and is shown on the device
    Pending,
    /// The submitted code was rejected
    NotAccepted,
    Other { status: u16, message: String },
}

impl PairingOutcome {
    /// Status line of a response that matched no other outcome
    pub fn other(response: &HttpResponse) -> Self {
        PairingOutcome::Other {
            status: response.status,
            message: response.describe(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PairingOutcome::Ok => "ok",
            PairingOutcome::NeedsPairing => "needspairing",
            PairingOutcome::ServiceMissing => "servicemissing",
            PairingOutcome::DisplayOff => "displayoff",
            PairingOutcome::HomeMenuRequired => "homemenu",
            PairingOutcome::Pending => "pending",
            PairingOutcome::NotAccepted => "notaccepted",
            PairingOutcome::Other { .. } => "other",
        }
    }

    pub fn message(&self) -> String {
        match self {
            PairingOutcome::Ok => "OK".to_string(),
            PairingOutcome::NeedsPairing => "Device needs pairing".to_string(),
            PairingOutcome::ServiceMissing => "Service is missing".to_string(),
            PairingOutcome::DisplayOff => {
                "Unable to request an access code - Display is turned off (must be on to see code)"
                    .to_string()
            }
            PairingOutcome::HomeMenuRequired => "Unable to request an access code - HOME menu not displayed on device. Please display the home menu and try again.".to_string(),
            PairingOutcome::Pending => "Access Code requested. Please update the Access Code with what is shown on the device screen.".to_string(),
            PairingOutcome::NotAccepted => "Access code was not accepted - please either request a new one or verify number matches what's shown on the device.".to_string(),
            PairingOutcome::Other { message, .. } => message.clone(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, PairingOutcome::Ok)
    }
}

impl fmt::Display for PairingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Where `actRegister` is posted and at which version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEndpoint {
    pub url: String,
    pub version: String,
}

impl RegistrationEndpoint {
    pub fn new(url: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            version: version.into(),
        }
    }

    /// The dispatcher's `accessControl` service, at the advertised
    /// `actRegister` version or 1.0 when the device lists none
    pub fn for_dispatcher(dispatcher: &CommandDispatcher) -> Self {
        let version = dispatcher
            .registry()
            .resolve_version(service::ACCESS_CONTROL, method::ACT_REGISTER)
            .unwrap_or_else(|| V1_0.to_string());
        Self::new(
            dispatcher.endpoints().service_url(service::ACCESS_CONTROL),
            version,
        )
    }
}

/// What the device's legacy (pre-JSON-RPC) remote-control interface advertises
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyClient {
    pub registration_url: Option<String>,
    pub registration_mode: Option<u32>,
    pub action_header: Option<String>,
}

impl LegacyClient {
    pub fn registration_url(&self) -> Option<&str> {
        self.registration_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn has_registration_url(&self) -> bool {
        self.registration_url().is_some()
    }

    /// Registration types in the order they are tried
    pub fn registration_types(&self) -> [&'static str; 2] {
        if self.registration_mode == Some(2) {
            ["new", "initial"]
        } else {
            ["initial", "new"]
        }
    }
}

pub struct PairingHandshake {
    dispatcher: Arc<CommandDispatcher>,
    identity: DeviceIdentity,
    endpoint: RegistrationEndpoint,
    legacy: LegacyClient,
}

impl PairingHandshake {
    pub fn new(dispatcher: Arc<CommandDispatcher>, identity: DeviceIdentity, legacy: LegacyClient) -> Self {
        let endpoint = RegistrationEndpoint::for_dispatcher(&dispatcher);
        Self::with_endpoint(dispatcher, identity, endpoint, legacy)
    }

    pub fn with_endpoint(
        dispatcher: Arc<CommandDispatcher>,
        identity: DeviceIdentity,
        endpoint: RegistrationEndpoint,
        legacy: LegacyClient,
    ) -> Self {
        Self {
            dispatcher,
            identity,
            endpoint,
            legacy,
        }
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    pub fn endpoint(&self) -> &RegistrationEndpoint {
        &self.endpoint
    }

    /// Start pairing (`None`) or submit the code shown on the device
    pub fn request_access(&self, code: Option<&str>) -> PairingOutcome {
        tracing::debug!(
            "Requesting access {}",
            if code.is_some() { "with access code" } else { "without access code" }
        );

        let session = self.session(code);
        let outcome = session.act_register();
        let status = outcome.status();
        let error_code = outcome.error_code();
        let has_legacy = self.legacy.has_registration_url();

        if status == HttpResponse::UNAUTHORIZED && !has_legacy {
            return match code {
                None => PairingOutcome::Pending,
                Some(_) => PairingOutcome::NotAccepted,
            };
        }

        let wants_legacy = error_code == codes::NOT_IMPLEMENTED
            || (error_code == codes::HTTP_ERROR && status == HttpResponse::SERVICE_UNAVAILABLE)
            || status == HttpResponse::UNAUTHORIZED
            || status == HttpResponse::FORBIDDEN;
        if wants_legacy && has_legacy {
            let response = session.legacy_register();
            return match response.status {
                HttpResponse::OK => PairingOutcome::Ok,
                HttpResponse::UNAUTHORIZED => PairingOutcome::Pending,
                _ => PairingOutcome::other(&response),
            };
        }

        if error_code == codes::DISPLAY_IS_OFF {
            return PairingOutcome::DisplayOff;
        }
        if status == HttpResponse::SERVICE_UNAVAILABLE {
            return PairingOutcome::HomeMenuRequired;
        }
        if status == HttpResponse::OK || error_code == codes::ILLEGAL_ARGUMENT {
            return PairingOutcome::Ok;
        }
        PairingOutcome::other(&outcome.to_response())
    }

    /// Renew an existing grant. Success is judged on the raw status alone.
    pub fn register_renewal(&self) -> PairingOutcome {
        tracing::debug!("Registering renewal");

        let session = self.session(None);
        let outcome = session.act_register();
        if outcome.status() == HttpResponse::OK {
            return PairingOutcome::Ok;
        }
        if outcome.status() == HttpResponse::UNAUTHORIZED && !self.legacy.has_registration_url() {
            return PairingOutcome::NeedsPairing;
        }

        let response = session.legacy_renewal();
        match response.status {
            HttpResponse::OK => PairingOutcome::Ok,
            _ => PairingOutcome::other(&response),
        }
    }

    fn session<'a>(&'a self, code: Option<&'a str>) -> PairingSession<'a> {
        PairingSession {
            handshake: self,
            code,
        }
    }
}

/// State of one attempt: the handshake's fixed inputs plus the operator code
struct PairingSession<'a> {
    handshake: &'a PairingHandshake,
    code: Option<&'a str>,
}

impl PairingSession<'_> {
    fn act_register(&self) -> Outcome {
        let handshake = self.handshake;
        let transport = handshake.dispatcher.transport().as_ref();
        transport.set_option(device_id_header(
            handshake.legacy.action_header.as_deref(),
            &handshake.identity.device_id,
        ));
        let _code_guard = self
            .code
            .map(|code| OptionGuard::attach(transport, access_code_header(code)));

        let result = handshake.dispatcher.invoke_at(
            &handshake.endpoint.url,
            method::ACT_REGISTER,
            &handshake.endpoint.version,
            self.register_params(),
            &self.auth_headers(),
        );
        match result {
            Ok(outcome) => {
                tracing::debug!("actRegister -> {}", outcome.describe());
                outcome
            }
            Err(e) => Outcome::TransportError {
                status: HttpResponse::INTERNAL_SERVER_ERROR,
                body: e.to_string(),
            },
        }
    }

    fn register_params(&self) -> Vec<Value> {
        let identity = &self.handshake.identity;
        vec![
            json!({
                "clientid": identity.device_id,
                "nickname": identity.device_name,
                "level": "private",
            }),
            json!([{ "value": "yes", "function": "WOL" }]),
        ]
    }

    fn auth_headers(&self) -> Vec<Header> {
        self.code.map(basic_auth_header).into_iter().collect()
    }

    fn legacy_register(&self) -> HttpResponse {
        let legacy = &self.handshake.legacy;
        let Some(url) = legacy.registration_url() else {
            return no_registration_url();
        };

        let [first, second] = legacy.registration_types();
        let headers = self.auth_headers();
        let transport = self.handshake.dispatcher.transport();

        let response = transport.execute_get(&self.legacy_url(url, first), &headers);
        if response.status != HttpResponse::BAD_REQUEST {
            return response;
        }
        tracing::debug!("Legacy registration type {} refused, trying {}", first, second);
        transport.execute_get(&self.legacy_url(url, second), &headers)
    }

    fn legacy_renewal(&self) -> HttpResponse {
        let Some(url) = self.handshake.legacy.registration_url() else {
            return no_registration_url();
        };
        self.handshake
            .dispatcher
            .transport()
            .execute_get(&self.legacy_url(url, "renewal"), &[])
    }

    fn legacy_url(&self, base: &str, registration_type: &str) -> String {
        let identity = &self.handshake.identity;
        format!(
            "{}?name={}&registrationType={}&deviceId={}",
            base,
            encode(&identity.device_name),
            registration_type,
            encode(&identity.device_id)
        )
    }
}

fn no_registration_url() -> HttpResponse {
    HttpResponse::new(HttpResponse::SERVICE_UNAVAILABLE, "No registration URL")
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
