//! One device session: transport, capability cache and dispatcher wired
//! together, plus the pairing entry points.

use std::sync::Arc;

use crate::auth::{self, AuthChecker, CheckOutcome, LegacyClient, PairingHandshake, PairingOutcome};
use crate::capability::{CapabilityRegistry, ServiceCapability};
use crate::config::{ClientConfig, DeviceIdentity, ServiceEndpoints};
use crate::dispatcher::CommandDispatcher;
use crate::error::Result;
use crate::scalarweb::RequestIds;
use crate::transport::{HttpTransport, Transport};

pub struct ScalarClient {
    dispatcher: Arc<CommandDispatcher>,
    identity: DeviceIdentity,
}

impl ScalarClient {
    pub fn new(transport: Arc<dyn Transport>, device_url: &str, identity: DeviceIdentity) -> Result<Self> {
        let endpoints = ServiceEndpoints::from_device_url(device_url)?;
        let ids = Arc::new(RequestIds::new());
        let registry = Arc::new(CapabilityRegistry::new(
            transport.clone(),
            endpoints.clone(),
            ids.clone(),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(transport, registry, endpoints, ids));
        Ok(Self {
            dispatcher,
            identity,
        })
    }

    /// Session over HTTP using the identity and timeouts from `config`
    pub fn connect(config: &ClientConfig, device_url: &str) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        tracing::debug!("Connecting to {} as {}", device_url, config.device_id);
        Self::new(transport, device_url, config.identity()?)
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        self.dispatcher.registry()
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn capabilities(&self, service: &str) -> Arc<ServiceCapability> {
        self.registry().capability(service)
    }

    pub fn handshake(&self, legacy: LegacyClient) -> PairingHandshake {
        PairingHandshake::new(self.dispatcher.clone(), self.identity.clone(), legacy)
    }

    /// Which credential the device accepts, probing with the access check
    pub fn check(&self, code: Option<&str>) -> CheckOutcome {
        let checker = AuthChecker::new(
            self.dispatcher.transport().clone(),
            code.map(|c| c.to_string()),
        );
        checker.check_result(|| auth::check_access(&self.dispatcher))
    }

    /// Request access directly. `RQST` asks the device to show a new code;
    /// anything else must be a valid code and is checked before sending.
    pub fn pair(&self, legacy: LegacyClient, code: Option<&str>) -> Result<PairingOutcome> {
        let code = match code {
            Some(c) if auth::is_code_request(c) => None,
            Some(c) => Some(auth::parse_access_code(c)?),
            None => None,
        };
        Ok(self.handshake(legacy).request_access(code))
    }

    pub fn login(&self, legacy: LegacyClient, code: Option<&str>) -> Result<PairingOutcome> {
        auth::login(&self.handshake(legacy), code)
    }
}
