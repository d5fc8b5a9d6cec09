//! Finds out which credential an already paired device accepts: the access
//! code sent as a header on every call, or the session cookie issued at
//! registration.

use std::sync::Arc;

use super::handshake::PairingOutcome;
use super::headers::access_code_header;
use crate::transport::{OptionGuard, Transport};

/// Access code value meaning "a code was requested but not entered yet"
pub const ACCESS_CODE_REQUEST: &str = "RQST";

pub fn is_code_request(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(ACCESS_CODE_REQUEST)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    OkViaHeader,
    OkViaSession,
    Failed(PairingOutcome),
}

impl CheckOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, CheckOutcome::Failed(_))
    }

    /// Collapse to the pairing vocabulary
    pub fn into_pairing(self) -> PairingOutcome {
        match self {
            CheckOutcome::OkViaHeader | CheckOutcome::OkViaSession => PairingOutcome::Ok,
            CheckOutcome::Failed(outcome) => outcome,
        }
    }
}

pub struct AuthChecker {
    transport: Arc<dyn Transport>,
    code: Option<String>,
}

impl AuthChecker {
    pub fn new(transport: Arc<dyn Transport>, code: Option<String>) -> Self {
        Self { transport, code }
    }

    /// Run `probe` with the access code attached, then again on whatever
    /// session state the transport holds. The probe must be idempotent.
    pub fn check_result<F>(&self, probe: F) -> CheckOutcome
    where
        F: Fn() -> PairingOutcome,
    {
        if let Some(code) = self.code.as_deref()
            && !code.trim().is_empty()
            && !is_code_request(code)
        {
            let _guard = OptionGuard::attach(self.transport.as_ref(), access_code_header(code));
            if probe().is_ok() {
                tracing::debug!("Device accepted the access code header");
                return CheckOutcome::OkViaHeader;
            }
        }

        match probe() {
            PairingOutcome::Ok => {
                tracing::debug!("Device accepted the session");
                CheckOutcome::OkViaSession
            }
            failure => CheckOutcome::Failed(failure),
        }
    }
}
