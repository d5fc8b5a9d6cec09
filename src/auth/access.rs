//! Access check against the `system` service and the login flow built on it.

use super::checker::{AuthChecker, is_code_request};
use super::handshake::{PairingHandshake, PairingOutcome};
use crate::dispatcher::CommandDispatcher;
use crate::error::{Result, ScalarError};
use crate::scalarweb::{codes, method, service};
use crate::transport::HttpResponse;

/// Probe whether protected calls are accepted. `getDeviceMode` is tried
/// first since some devices leave power status unprotected.
pub fn check_access(dispatcher: &CommandDispatcher) -> PairingOutcome {
    if dispatcher.registry().capability(service::SYSTEM).is_empty() {
        return PairingOutcome::ServiceMissing;
    }

    let call = |name: &str| dispatcher.invoke(service::SYSTEM, name, |_| None);
    let outcome = match call(method::GET_DEVICE_MODE) {
        Ok(outcome) if outcome.is_unsupported() => call(method::GET_POWER_STATUS),
        other => other,
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            return PairingOutcome::Other {
                status: HttpResponse::INTERNAL_SERVER_ERROR,
                message: e.to_string(),
            };
        }
    };

    let status = outcome.status();
    let error_code = outcome.error_code();
    if error_code == codes::DISPLAY_IS_OFF {
        return PairingOutcome::DisplayOff;
    }
    if outcome.is_unsupported() {
        return PairingOutcome::NeedsPairing;
    }
    if status == HttpResponse::OK || error_code == codes::ILLEGAL_ARGUMENT {
        return PairingOutcome::Ok;
    }
    if status == HttpResponse::UNAUTHORIZED || status == HttpResponse::FORBIDDEN {
        return PairingOutcome::NeedsPairing;
    }
    PairingOutcome::other(&outcome.to_response())
}

/// Validate an operator code: at most 4 digits
pub fn parse_access_code(code: &str) -> Result<&str> {
    let code = code.trim();
    if code.is_empty() || code.len() > 4 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ScalarError::InvalidArgument(format!(
            "Access code is not RQST or a number of at most 4 digits: {}",
            code
        )));
    }
    Ok(code)
}

/// Check access with the stored code, pairing when the device asks for it.
///
/// `RQST` starts a new pairing; a numeric code is submitted. An invalid
/// code is rejected before anything is sent.
pub fn login(handshake: &PairingHandshake, code: Option<&str>) -> Result<PairingOutcome> {
    let dispatcher = handshake.dispatcher();
    let code = code.map(str::trim).filter(|c| !c.is_empty());
    let submitted = match code {
        Some(c) if !is_code_request(c) => Some(parse_access_code(c)?),
        _ => None,
    };

    let checker = AuthChecker::new(dispatcher.transport().clone(), code.map(|c| c.to_string()));
    let outcome = checker.check_result(|| check_access(dispatcher)).into_pairing();
    if outcome != PairingOutcome::NeedsPairing {
        return Ok(outcome);
    }

    match (code, submitted) {
        (Some(_), Some(submitted)) => Ok(handshake.request_access(Some(submitted))),
        (Some(_), None) => Ok(handshake.request_access(None)),
        (None, _) => Ok(PairingOutcome::NeedsPairing),
    }
}
