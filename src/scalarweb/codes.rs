//! Device error codes and how callers are expected to react to them.

pub const NONE: i64 = 0;
pub const ANY: i64 = 1;
pub const TIMEOUT: i64 = 2;
pub const ILLEGAL_ARGUMENT: i64 = 3;
pub const ILLEGAL_REQUEST: i64 = 5;
pub const ILLEGAL_STATE: i64 = 7;
pub const NOT_IMPLEMENTED: i64 = 12;
pub const UNSUPPORTED_VERSION: i64 = 14;
pub const UNSUPPORTED_OPERATION: i64 = 15;
pub const DISPLAY_IS_OFF: i64 = 40005;
pub const FAILED_TO_LAUNCH: i64 = 41401;

/// Never sent by a device: reported for any non-200 HTTP exchange
pub const HTTP_ERROR: i64 = 20000;
/// Never sent by a device: reported when the error code is not numeric
pub const UNKNOWN: i64 = 10000;

/// What a caller does with a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Expected on some firmware, not an error
    Ignore,
    /// Communication failure, the connection status must change
    ReportOffline,
    /// Needs operator attention or caller-specific handling
    Propagate,
}

/// Map a device error code to exactly one disposition
pub fn classify(code: i64) -> ErrorDisposition {
    match code {
        NOT_IMPLEMENTED | ILLEGAL_ARGUMENT => ErrorDisposition::Ignore,
        HTTP_ERROR => ErrorDisposition::ReportOffline,
        _ => ErrorDisposition::Propagate,
    }
}

/// Short label for log lines
pub fn describe(code: i64) -> &'static str {
    match code {
        NONE => "none",
        ILLEGAL_ARGUMENT => "illegal argument",
        ILLEGAL_STATE => "illegal state",
        NOT_IMPLEMENTED => "not implemented",
        DISPLAY_IS_OFF => "display is off",
        FAILED_TO_LAUNCH => "failed to launch",
        HTTP_ERROR => "http error",
        _ => "device error",
    }
}
