//! Executes device methods at the version the device negotiated.
//!
//! Callers hand over a version-keyed parameter builder; the dispatcher picks
//! the highest advertised version, builds the call, posts it and returns a
//! uniform `Outcome`. A method the device does not list is answered locally
//! with the not-implemented sentinel and never sent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::capability::CapabilityRegistry;
use crate::config::ServiceEndpoints;
use crate::error::{Result, ScalarError, require_non_empty};
use crate::scalarweb::{self, ErrorDisposition, Outcome, RequestIds, ScalarRequest};
use crate::transport::{Header, HttpResponse, Transport};

/// Connectivity as seen by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Offline(String),
}

/// Told when a call shows the device is unreachable, and again once a later
/// call gets an answer
pub trait StatusListener: Send + Sync {
    fn status_changed(&self, status: ConnectionStatus);
}

pub struct CommandDispatcher {
    transport: Arc<dyn Transport>,
    registry: Arc<CapabilityRegistry>,
    endpoints: ServiceEndpoints,
    ids: Arc<RequestIds>,
    status_listener: Option<Arc<dyn StatusListener>>,
    offline: AtomicBool,
}

impl CommandDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<CapabilityRegistry>,
        endpoints: ServiceEndpoints,
        ids: Arc<RequestIds>,
    ) -> Self {
        Self {
            transport,
            registry,
            endpoints,
            ids,
            status_listener: None,
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_status_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.status_listener = Some(listener);
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    /// Call a method at its negotiated version.
    ///
    /// `builder` receives the version and returns the params for it, or
    /// `None` when that version takes no parameters. Only an empty service or
    /// method name is an error; every device answer comes back as an `Outcome`.
    pub fn invoke<F>(&self, service: &str, method: &str, builder: F) -> Result<Outcome>
    where
        F: FnOnce(&str) -> Option<Vec<Value>>,
    {
        require_non_empty(service, "service")?;
        require_non_empty(method, "method")?;

        let Some(version) = self.registry.resolve_version(service, method) else {
            tracing::debug!("{}.{} is not implemented on this device", service, method);
            return Ok(Outcome::not_implemented(method));
        };

        let transports = self.registry.resolve_transport(service, method, &version);
        let kind = self.transport.kind();
        if !transports.is_empty() && !transports.contains(&kind) {
            tracing::debug!(
                "{}.{} v{} is not reachable over {}",
                service,
                method,
                version,
                kind
            );
            return Ok(Outcome::TransportError {
                status: HttpResponse::INTERNAL_SERVER_ERROR,
                body: format!("No transport for {}.{} v{} over {}", service, method, version, kind),
            });
        }

        let params = builder(&version).unwrap_or_default();
        let url = self.endpoints.service_url(service);
        Ok(self.send(&url, method, &version, params, &[]))
    }

    /// Call an explicit version without consulting the capability registry
    pub fn invoke_version(
        &self,
        service: &str,
        method: &str,
        version: &str,
        params: Vec<Value>,
        headers: &[Header],
    ) -> Result<Outcome> {
        require_non_empty(service, "service")?;
        self.invoke_at(&self.endpoints.service_url(service), method, version, params, headers)
    }

    /// Call an explicit version on a full service URL
    pub fn invoke_at(
        &self,
        url: &str,
        method: &str,
        version: &str,
        params: Vec<Value>,
        headers: &[Header],
    ) -> Result<Outcome> {
        require_non_empty(url, "url")?;
        require_non_empty(method, "method")?;
        require_non_empty(version, "version")?;
        Ok(self.send(url, method, version, params, headers))
    }

    /// Throwing mode: any failure that is not ignorable becomes an error
    /// carrying the HTTP status and body. Ignorable device errors and the
    /// not-implemented sentinel come back as outcomes.
    pub fn execute<F>(&self, service: &str, method: &str, builder: F) -> Result<Outcome>
    where
        F: FnOnce(&str) -> Option<Vec<Value>>,
    {
        let outcome = self.invoke(service, method, builder)?;
        match outcome.disposition() {
            Some(ErrorDisposition::ReportOffline | ErrorDisposition::Propagate) => {
                Err(ScalarError::Communication {
                    status: outcome.status(),
                    body: outcome.body(),
                })
            }
            _ => Ok(outcome),
        }
    }

    /// Non-throwing mode: log the failure, report lost connectivity to the
    /// status listener and hand the outcome back unchanged
    pub fn handle<F>(&self, service: &str, method: &str, builder: F) -> Result<Outcome>
    where
        F: FnOnce(&str) -> Option<Vec<Value>>,
    {
        let outcome = self.invoke(service, method, builder)?;
        match outcome.disposition() {
            None => self.mark_online(),
            Some(ErrorDisposition::Ignore) => {
                tracing::debug!("{}.{}: {}", service, method, outcome.describe());
                self.mark_online();
            }
            Some(ErrorDisposition::ReportOffline) => {
                tracing::warn!(
                    "Communication error calling {}.{}: {}",
                    service,
                    method,
                    outcome.describe()
                );
                self.offline.store(true, Ordering::SeqCst);
                if let Some(listener) = &self.status_listener {
                    listener.status_changed(ConnectionStatus::Offline(outcome.to_response().describe()));
                }
            }
            Some(ErrorDisposition::Propagate) => {
                tracing::warn!("{}.{} failed: {}", service, method, outcome.describe());
            }
        }
        Ok(outcome)
    }

    fn mark_online(&self) {
        if self.offline.swap(false, Ordering::SeqCst)
            && let Some(listener) = &self.status_listener
        {
            listener.status_changed(ConnectionStatus::Online);
        }
    }

    fn send(
        &self,
        url: &str,
        method: &str,
        version: &str,
        params: Vec<Value>,
        headers: &[Header],
    ) -> Outcome {
        let request = ScalarRequest::new(self.ids.next(), method, version, params);
        scalarweb::post(self.transport.as_ref(), url, &request, headers).outcome
    }
}
