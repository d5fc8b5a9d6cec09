//! Pairing, renewal and credential checks.

mod access;
mod checker;
mod handshake;
pub mod headers;

pub use access::{check_access, login, parse_access_code};
pub use checker::{ACCESS_CODE_REQUEST, AuthChecker, CheckOutcome, is_code_request};
pub use handshake::{LegacyClient, PairingHandshake, PairingOutcome, RegistrationEndpoint};
