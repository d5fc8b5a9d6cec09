use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use serde_json::Value;

/// One JSON-RPC call: `{"id", "method", "version", "params"}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarRequest {
    pub id: u32,
    pub method: String,
    pub version: String,
    pub params: Vec<Value>,
}

impl ScalarRequest {
    pub fn new(id: u32, method: &str, version: &str, params: Vec<Value>) -> Self {
        Self {
            id,
            method: method.to_string(),
            version: version.to_string(),
            params,
        }
    }
}

/// Monotonic request id source, shared by everything talking to one device
#[derive(Debug)]
pub struct RequestIds(AtomicU32);

impl RequestIds {
    pub fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request = ScalarRequest::new(3, "getVersions", "1.0", Vec::new());
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(
            wire,
            json!({"id": 3, "method": "getVersions", "version": "1.0", "params": []})
        );
    }

    #[test]
    fn test_request_ids_increase() {
        let ids = RequestIds::new();
        let first = ids.next();
        assert_eq!(ids.next(), first + 1);
    }
}
