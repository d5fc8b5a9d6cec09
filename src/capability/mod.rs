//! Which methods, versions and transports a device service supports.

mod registry;
mod version;

pub use registry::CapabilityRegistry;
pub use version::compare_versions;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::{TransportKind, TransportKinds};

/// Per-version details of a method
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodVersion {
    #[serde(default)]
    pub auth_level: String,
    #[serde(default)]
    pub transports: TransportKinds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub name: String,
    pub version: String,
    /// Subscription state when known (fallback discovery only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Capabilities of one service. Method and version keys are exact,
/// case-sensitive matches. An empty method map means every call is
/// treated as unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCapability {
    pub service: String,
    /// Blanket transports of the service, used when a method version lists none
    #[serde(default)]
    pub protocols: TransportKinds,
    /// method name -> version -> details
    #[serde(default)]
    pub methods: BTreeMap<String, BTreeMap<String, MethodVersion>>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

impl ServiceCapability {
    pub fn empty(service: &str) -> Self {
        Self {
            service: service.to_string(),
            protocols: TransportKinds::new(),
            methods: BTreeMap::new(),
            notifications: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// All advertised versions of a method, lowest first
    pub fn versions(&self, method: &str) -> Vec<String> {
        let mut versions: Vec<String> = self
            .methods
            .get(method)
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }

    /// Numerically highest advertised version of a method
    pub fn latest_version(&self, method: &str) -> Option<&str> {
        self.methods
            .get(method)?
            .keys()
            .max_by(|a, b| compare_versions(a, b))
            .map(|v| v.as_str())
    }

    /// Transports for a method version, or the service's blanket set
    pub fn transports(&self, method: &str, version: &str) -> TransportKinds {
        match self.methods.get(method).and_then(|v| v.get(version)) {
            Some(info) if !info.transports.is_empty() => info.transports.clone(),
            _ => self.protocols.clone(),
        }
    }

    pub fn insert_method(&mut self, method: &str, version: &str, info: MethodVersion) {
        self.methods
            .entry(method.to_string())
            .or_default()
            .insert(version.to_string(), info);
    }

    /// Build from one service entry of a `getSupportedApiInfo` answer
    pub(crate) fn from_supported_api(entry: &Value) -> Option<Self> {
        let api: SupportedApi = serde_json::from_value(entry.clone()).ok()?;
        let mut capability = ServiceCapability::empty(&api.service);
        capability.protocols = api.protocols.into_iter().map(TransportKind::from).collect();

        for method in api.apis {
            for version in method.versions {
                capability.insert_method(
                    &method.name,
                    &version.version,
                    MethodVersion {
                        auth_level: version.auth_level.unwrap_or_default(),
                        transports: version
                            .protocols
                            .into_iter()
                            .map(TransportKind::from)
                            .collect(),
                    },
                );
            }
        }

        for notification in api.notifications {
            for version in notification.versions {
                capability.notifications.push(Notification {
                    name: notification.name.clone(),
                    version: version.version,
                    enabled: None,
                });
            }
        }

        Some(capability)
    }
}

// Wire shape of getSupportedApiInfo
#[derive(Deserialize)]
struct SupportedApi {
    service: String,
    #[serde(default)]
    protocols: Vec<String>,
    #[serde(default)]
    apis: Vec<SupportedApiInfo>,
    #[serde(default)]
    notifications: Vec<SupportedApiInfo>,
}

#[derive(Deserialize)]
struct SupportedApiInfo {
    name: String,
    #[serde(default)]
    versions: Vec<SupportedApiVersion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SupportedApiVersion {
    version: String,
    #[serde(default)]
    auth_level: Option<String>,
    #[serde(default)]
    protocols: Vec<String>,
}
