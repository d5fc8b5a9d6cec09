//! Client configuration: the identity this client registers under, HTTP
//! settings, and the URL layout of a device's services.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ScalarError, require_non_empty};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub device_id: String,
    pub device_name: Option<String>,
    pub app_name: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_id: "MediaRemote:00-11-22-33-44-55".to_string(),
            device_name: None,
            app_name: "scalarweb".to_string(),
            timeout_secs: 10,
            user_agent: format!("scalarweb-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScalarError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| ScalarError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn identity(&self) -> Result<DeviceIdentity> {
        require_non_empty(&self.device_id, "device_id")?;
        let device_name = match &self.device_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("{} ({})", self.app_name, self.device_id),
        };
        Ok(DeviceIdentity {
            device_id: self.device_id.clone(),
            device_name,
        })
    }
}

/// The stable identity presented to the device during registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub device_name: String,
}

/// URL layout of the JSON-RPC services: `<scheme>://<host>[:port]/sony/<service>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    base: String,
}

impl ServiceEndpoints {
    /// Build from any URL pointing at the device; its path is ignored
    pub fn from_device_url(device_url: &str) -> Result<Self> {
        let url = Url::parse(device_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| ScalarError::InvalidArgument(format!("{} has no host", device_url)))?;
        let base = match url.port() {
            Some(port) => format!("{}://{}:{}/sony", url.scheme(), host, port),
            None => format!("{}://{}/sony", url.scheme(), host),
        };
        Ok(Self { base })
    }

    pub fn service_url(&self, service: &str) -> String {
        format!("{}/{}", self.base, service)
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}
