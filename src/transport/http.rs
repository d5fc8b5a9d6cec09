//! Blocking HTTP transport backed by `reqwest`. Session cookies issued by the
//! device are kept in the client's cookie store between calls.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};

use super::{EventListener, Header, HttpResponse, Transport, TransportKind, upsert_header};
use crate::config::ClientConfig;
use crate::error::Result;

pub struct HttpTransport {
    client: Client,
    options: Mutex<Vec<Header>>,
    listeners: Mutex<Vec<Arc<dyn EventListener>>>,
}

impl HttpTransport {
    const DEVICE_INFO_HEADER: &'static str = "X-CERS-DEVICE-INFO";

    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut defaults = reqwest::header::HeaderMap::new();
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&config.user_agent) {
            defaults.insert(Self::DEVICE_INFO_HEADER, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(defaults)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            options: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        })
    }

    fn lock_options(&self) -> MutexGuard<'_, Vec<Header>> {
        self.options.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_headers(&self, mut builder: RequestBuilder, headers: &[Header]) -> RequestBuilder {
        for header in self.lock_options().iter().chain(headers) {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        builder
    }

    fn send(builder: RequestBuilder, url: &str) -> HttpResponse {
        match builder.send() {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text() {
                    Ok(body) => HttpResponse::new(status, body),
                    Err(e) => HttpResponse::new(
                        HttpResponse::INTERNAL_SERVER_ERROR,
                        format!("Failed to read response from {}: {}", url, e),
                    ),
                }
            }
            Err(e) => {
                tracing::debug!("Request to {} failed: {}", url, e);
                HttpResponse::new(
                    HttpResponse::INTERNAL_SERVER_ERROR,
                    format!("Execution of {} failed: {}", url, e),
                )
            }
        }
    }
}

impl Transport for HttpTransport {
    fn execute_get(&self, url: &str, headers: &[Header]) -> HttpResponse {
        let builder = self.with_headers(self.client.get(url), headers);
        Self::send(builder, url)
    }

    fn execute_post_json(&self, url: &str, body: &str, headers: &[Header]) -> HttpResponse {
        let builder = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        let builder = self.with_headers(builder, headers);
        Self::send(builder, url)
    }

    fn set_option(&self, header: Header) {
        upsert_header(&mut self.lock_options(), header);
    }

    fn remove_option(&self, header: &Header) {
        self.lock_options().retain(|h| h != header);
    }

    fn options(&self) -> Vec<Header> {
        self.lock_options().clone()
    }

    fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    fn kind(&self) -> TransportKind {
        TransportKind::HttpPost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_replace_and_remove() {
        let transport = HttpTransport::new(&ClientConfig::default()).unwrap();
        transport.set_option(Header::new("X-CERS-DEVICE-ID", "a"));
        transport.set_option(Header::new("X-CERS-DEVICE-ID", "b"));
        assert_eq!(transport.options(), vec![Header::new("X-CERS-DEVICE-ID", "b")]);

        // Only an exact match is removed
        transport.remove_option(&Header::new("X-CERS-DEVICE-ID", "a"));
        assert_eq!(transport.options().len(), 1);
        transport.remove_option(&Header::new("X-CERS-DEVICE-ID", "b"));
        assert!(transport.options().is_empty());
    }

    #[test]
    fn test_unreachable_host_is_synthetic_500() {
        let config = ClientConfig {
            timeout_secs: 1,
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let response = transport.execute_get("http://127.0.0.1:1/sony/system", &[]);
        assert_eq!(response.status, HttpResponse::INTERNAL_SERVER_ERROR);
        assert!(response.body.contains("127.0.0.1:1"));
    }

    #[test]
    fn test_kind_is_http_post() {
        let transport = HttpTransport::new(&ClientConfig::default()).unwrap();
        assert_eq!(transport.kind(), TransportKind::HttpPost);
    }
}
