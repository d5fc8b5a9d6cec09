//! Discovers and caches service capabilities for one device session.
//!
//! Discovery first asks the `guide` service for `getSupportedApiInfo`. When
//! that is not available it rebuilds the map from `getVersions` and
//! `getMethodTypes` on the service itself and reads the notification list
//! with `switchNotifications`. Results are cached until invalidated; a
//! per-service guard keeps concurrent callers from discovering twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::{Value, json};

use super::{MethodVersion, Notification, ServiceCapability};
use crate::config::ServiceEndpoints;
use crate::scalarweb::{self, RequestIds, ScalarRequest, method, service};
use crate::transport::{Transport, TransportKinds};

pub struct CapabilityRegistry {
    transport: Arc<dyn Transport>,
    endpoints: ServiceEndpoints,
    ids: Arc<RequestIds>,
    cache: RwLock<HashMap<String, Arc<ServiceCapability>>>,
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CapabilityRegistry {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: ServiceEndpoints,
        ids: Arc<RequestIds>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            ids,
            cache: RwLock::new(HashMap::new()),
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// Cached capability of a service, discovering it on first use
    pub fn capability(&self, service: &str) -> Arc<ServiceCapability> {
        if let Some(cached) = self.snapshot(service) {
            return cached;
        }

        let guard = self.guard(service);
        let _lock = guard.lock().unwrap_or_else(|e| e.into_inner());

        // Another caller may have finished discovery while we waited
        if let Some(cached) = self.snapshot(service) {
            return cached;
        }
        self.discover_locked(service)
    }

    /// Query the device again and replace the cached entry. Never fails: a
    /// device that answers nothing yields an empty capability.
    pub fn discover(&self, service: &str) -> Arc<ServiceCapability> {
        let guard = self.guard(service);
        let _lock = guard.lock().unwrap_or_else(|e| e.into_inner());
        self.discover_locked(service)
    }

    /// Highest advertised version of a method. `None` means the method is
    /// not available on this firmware and must not be retried.
    pub fn resolve_version(&self, service: &str, method: &str) -> Option<String> {
        self.capability(service)
            .latest_version(method)
            .map(|v| v.to_string())
    }

    pub fn resolve_transport(&self, service: &str, method: &str, version: &str) -> TransportKinds {
        self.capability(service).transports(method, version)
    }

    pub fn has_method(&self, service: &str, method: &str) -> bool {
        self.capability(service).has_method(method)
    }

    pub fn versions(&self, service: &str, method: &str) -> Vec<String> {
        self.capability(service).versions(method)
    }

    pub fn notifications(&self, service: &str) -> Vec<Notification> {
        self.capability(service).notifications.clone()
    }

    /// Cached entry without triggering discovery
    pub fn snapshot(&self, service: &str) -> Option<Arc<ServiceCapability>> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(service)
            .cloned()
    }

    /// Seed the cache with a previously serialized capability
    pub fn preload(&self, capability: ServiceCapability) {
        self.store(Arc::new(capability));
    }

    pub fn invalidate(&self, service: &str) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(service);
    }

    pub fn invalidate_all(&self) {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn guard(&self, service: &str) -> Arc<Mutex<()>> {
        self.guards
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(service.to_string())
            .or_default()
            .clone()
    }

    fn store(&self, capability: Arc<ServiceCapability>) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(capability.service.clone(), capability);
    }

    fn discover_locked(&self, service: &str) -> Arc<ServiceCapability> {
        let capability = match self.discover_native(service) {
            Some(capability) => capability,
            None => self.discover_fallback(service),
        };
        tracing::debug!(
            "Discovered {} methods and {} notifications on service {}",
            capability.methods.len(),
            capability.notifications.len(),
            service
        );
        let capability = Arc::new(capability);
        self.store(capability.clone());
        capability
    }

    fn call(&self, service: &str, method: &str, params: Vec<Value>) -> scalarweb::Outcome {
        let request = ScalarRequest::new(self.ids.next(), method, scalarweb::V1_0, params);
        let url = self.endpoints.service_url(service);
        scalarweb::post(self.transport.as_ref(), &url, &request, &[]).outcome
    }

    fn discover_native(&self, service: &str) -> Option<ServiceCapability> {
        let outcome = self.call(
            service::GUIDE,
            method::GET_SUPPORTED_API_INFO,
            vec![json!({ "services": [service] })],
        );

        let Some(results) = outcome.results() else {
            tracing::debug!(
                "getSupportedApiInfo unavailable for {}: {}",
                service,
                outcome.describe()
            );
            return None;
        };

        let entries = results.first()?.as_array()?;
        let capability = entries
            .iter()
            .filter(|e| e.get("service").and_then(|s| s.as_str()) == Some(service))
            .find_map(ServiceCapability::from_supported_api);

        if capability.is_none() {
            tracing::debug!("getSupportedApiInfo did not describe service {}", service);
        }
        capability
    }

    fn discover_fallback(&self, service: &str) -> ServiceCapability {
        let mut capability = ServiceCapability::empty(service);
        capability.protocols.insert(self.transport.kind());

        for api_version in self.api_versions(service) {
            let outcome = self.call(service, method::GET_METHOD_TYPES, vec![json!(api_version)]);
            let Some(results) = outcome.results() else {
                tracing::debug!(
                    "Could not retrieve method types {} of {}: {}",
                    api_version,
                    service,
                    outcome.describe()
                );
                continue;
            };

            for (name, version) in results.iter().filter_map(parse_method_type) {
                capability.insert_method(&name, &version, MethodVersion::default());
            }
        }

        capability.notifications = self.notification_list(service);
        capability
    }

    fn api_versions(&self, service: &str) -> Vec<String> {
        let outcome = self.call(service, method::GET_VERSIONS, Vec::new());
        let versions = outcome
            .results()
            .and_then(|r| r.first())
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect::<Vec<_>>()
            });

        match versions {
            Some(versions) => versions,
            None => {
                tracing::debug!(
                    "Could not retrieve versions of {}: {}",
                    service,
                    outcome.describe()
                );
                Vec::new()
            }
        }
    }

    fn notification_list(&self, service: &str) -> Vec<Notification> {
        let outcome = self.call(
            service,
            method::SWITCH_NOTIFICATIONS,
            vec![json!({ "enabled": [], "disabled": [] })],
        );
        let Some(status) = outcome.results().and_then(|r| r.first()) else {
            tracing::debug!(
                "Could not retrieve notifications of {}: {}",
                service,
                outcome.describe()
            );
            return Vec::new();
        };

        let mut notifications = Vec::new();
        for (key, enabled) in [("enabled", true), ("disabled", false)] {
            let entries = status.get(key).and_then(|v| v.as_array());
            for entry in entries.into_iter().flatten() {
                if let Some(name) = entry.get("name").and_then(|v| v.as_str())
                    && let Some(version) = entry.get("version").and_then(|v| v.as_str())
                {
                    notifications.push(Notification {
                        name: name.to_string(),
                        version: version.to_string(),
                        enabled: Some(enabled),
                    });
                }
            }
        }
        notifications
    }
}

/// One `getMethodTypes` entry: `[name, [param types], [result types], version]`
fn parse_method_type(entry: &Value) -> Option<(String, String)> {
    let fields = entry.as_array()?;
    let name = fields.first()?.as_str()?;
    let version = fields.get(3)?.as_str()?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name.to_string(), version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalarweb::codes;
    use crate::test_utils::{ScriptedTransport, device_error, result};
    use crate::transport::{HttpResponse, TransportKind};

    const BASE: &str = "http://tv.local/sony";

    fn registry(transport: &Arc<ScriptedTransport>) -> CapabilityRegistry {
        CapabilityRegistry::new(
            transport.clone(),
            ServiceEndpoints::from_device_url(BASE).unwrap(),
            Arc::new(RequestIds::new()),
        )
    }

    fn fallback_device() -> Arc<ScriptedTransport> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc(
            "getSupportedApiInfo",
            device_error(codes::NOT_IMPLEMENTED, "getSupportedApiInfo"),
        );
        transport.on_rpc("getVersions", result(json!([["1.0", "1.1"]])));
        transport.on_rpc_params(
            "getMethodTypes",
            json!(["1.0"]),
            result(json!([["setPowerStatus", ["{\"status\":\"bool\"}"], [], "1.0"]])),
        );
        transport.on_rpc_params(
            "getMethodTypes",
            json!(["1.1"]),
            result(json!([
                ["setPowerStatus", ["{\"status\":\"bool\"}"], [], "1.1"],
                ["getPowerStatus", [], ["{\"status\":\"string\"}"], "1.1"]
            ])),
        );
        transport.on_rpc(
            "switchNotifications",
            result(json!([{
                "enabled": [{"name": "notifyPowerStatus", "version": "1.0"}],
                "disabled": [{"name": "notifyStorageStatus", "version": "1.0"}]
            }])),
        );
        transport
    }

    #[test]
    fn test_fallback_discovery_resolves_highest_version() {
        let transport = fallback_device();
        let registry = registry(&transport);

        assert_eq!(
            registry.resolve_version("system", "setPowerStatus").as_deref(),
            Some("1.1")
        );
        assert_eq!(registry.versions("system", "setPowerStatus"), vec!["1.0", "1.1"]);
        assert_eq!(registry.resolve_version("system", "getTime"), None);

        // native + getVersions + 2x getMethodTypes + switchNotifications
        assert_eq!(transport.requests().len(), 5);
        assert_eq!(transport.requests()[0].url, "http://tv.local/sony/guide");
        assert_eq!(transport.requests()[1].url, "http://tv.local/sony/system");
    }

    #[test]
    fn test_fallback_records_notifications() {
        let transport = fallback_device();
        let registry = registry(&transport);

        let notifications = registry.notifications("system");
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].name, "notifyPowerStatus");
        assert_eq!(notifications[0].enabled, Some(true));
        assert_eq!(notifications[1].enabled, Some(false));
    }

    #[test]
    fn test_fallback_protocols_use_transport_kind() {
        let transport = fallback_device();
        let registry = registry(&transport);

        let transports = registry.resolve_transport("system", "setPowerStatus", "1.1");
        assert_eq!(transports.into_iter().collect::<Vec<_>>(), vec![TransportKind::HttpPost]);
    }

    #[test]
    fn test_notification_failure_does_not_abort_discovery() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc("getSupportedApiInfo", HttpResponse::new(404, "Not Found"));
        transport.on_rpc("getVersions", result(json!([["1.0"]])));
        transport.on_rpc(
            "getMethodTypes",
            result(json!([["getPowerStatus", [], [], "1.0"]])),
        );
        transport.on_rpc("switchNotifications", device_error(codes::NOT_IMPLEMENTED, "x"));

        let registry = registry(&transport);
        let capability = registry.capability("system");
        assert!(capability.has_method("getPowerStatus"));
        assert!(capability.notifications.is_empty());
    }

    #[test]
    fn test_total_failure_yields_empty_capability() {
        let transport = Arc::new(ScriptedTransport::new());
        let registry = registry(&transport);

        let capability = registry.capability("audio");
        assert!(capability.is_empty());
        assert_eq!(registry.resolve_version("audio", "setAudioVolume"), None);

        // The empty result is cached; no further traffic
        let before = transport.requests().len();
        assert_eq!(registry.resolve_version("audio", "getVolumeInformation"), None);
        assert_eq!(transport.requests().len(), before);
    }

    #[test]
    fn test_native_discovery() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc(
            "getSupportedApiInfo",
            result(json!([[{
                "service": "system",
                "protocols": ["xhrpost:jsonizer"],
                "apis": [{"name": "getPowerStatus", "versions": [{"version": "1.0"}, {"version": "1.1"}]}],
                "notifications": []
            }]])),
        );

        let registry = registry(&transport);
        assert_eq!(
            registry.resolve_version("system", "getPowerStatus").as_deref(),
            Some("1.1")
        );
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(
            transport.requests()[0].params(),
            json!([{"services": ["system"]}])
        );
    }

    #[test]
    fn test_native_answer_for_other_service_falls_back() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc(
            "getSupportedApiInfo",
            result(json!([[{"service": "audio", "apis": []}]])),
        );
        transport.on_rpc("getVersions", result(json!([["1.0"]])));
        transport.on_rpc("getMethodTypes", result(json!([["getPowerStatus", [], [], "1.0"]])));

        let registry = registry(&transport);
        assert!(registry.has_method("system", "getPowerStatus"));
    }

    #[test]
    fn test_capability_is_cached_until_invalidated() {
        let transport = fallback_device();
        let registry = registry(&transport);

        registry.capability("system");
        let after_first = transport.requests().len();
        registry.capability("system");
        assert_eq!(transport.requests().len(), after_first);

        registry.invalidate("system");
        assert!(registry.snapshot("system").is_none());
        registry.capability("system");
        assert_eq!(transport.requests().len(), after_first * 2);
    }

    #[test]
    fn test_serialized_capability_answers_like_fresh_discovery() {
        let transport = fallback_device();
        let fresh = registry(&transport);
        let discovered = fresh.discover("system");
        let json = serde_json::to_string(&*discovered).unwrap();

        let restored: ServiceCapability = serde_json::from_str(&json).unwrap();
        let offline = registry(&Arc::new(ScriptedTransport::new()));
        offline.preload(restored);

        for method in ["setPowerStatus", "getPowerStatus", "missing"] {
            assert_eq!(
                offline.resolve_version("system", method),
                fresh.resolve_version("system", method)
            );
            assert_eq!(
                offline.resolve_transport("system", method, "1.1"),
                fresh.resolve_transport("system", method, "1.1")
            );
        }
    }

    #[test]
    fn test_concurrent_callers_discover_once() {
        let transport = fallback_device();
        let registry = Arc::new(registry(&transport));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.resolve_version("system", "setPowerStatus"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("1.1"));
        }
        assert_eq!(transport.requests().len(), 5);
    }

    #[test]
    fn test_parse_method_type() {
        assert_eq!(
            parse_method_type(&json!(["getPowerStatus", [], [], "1.0"])),
            Some(("getPowerStatus".to_string(), "1.0".to_string()))
        );
        assert_eq!(parse_method_type(&json!(["getPowerStatus", []])), None);
        assert_eq!(parse_method_type(&json!("getPowerStatus")), None);
    }

}
