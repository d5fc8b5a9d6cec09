//! Credential and identity headers sent during registration.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::transport::Header;

/// Carries the operator code on the registration call and on probes
pub const ACCESS_CODE_HEADER: &str = "X-Auth-PSK";

/// Device identity header used when the device advertises none
pub const DEFAULT_DEVICE_ID_HEADER: &str = "X-CERS-DEVICE-ID";

pub fn access_code_header(code: &str) -> Header {
    Header::new(ACCESS_CODE_HEADER, code)
}

/// `X-<action header>` when the legacy system info names one, else `X-CERS-DEVICE-ID`
pub fn device_id_header(action_header: Option<&str>, device_id: &str) -> Header {
    let name = match action_header.map(str::trim) {
        Some(action) if !action.is_empty() => format!("X-{}", action),
        _ => DEFAULT_DEVICE_ID_HEADER.to_string(),
    };
    Header::new(name, device_id)
}

/// `Authorization: Basic base64(":" + code)`, code left-padded with zeros to 4 chars
pub fn basic_auth_header(code: &str) -> Header {
    let credentials = format!(":{:0>4}", code);
    Header::new(
        "Authorization",
        format!("Basic {}", STANDARD.encode(credentials)),
    )
}
