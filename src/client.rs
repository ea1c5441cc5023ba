//! JSON-over-HTTPS transport for stage requests.
//!
//! The sequencer only sees the [`Transport`] trait, so tests can script
//! responses without a server.
use crate::error::ProvisionError;
use serde_json::Value;
use std::time::Instant;
use ureq::tls::TlsConfig;
use ureq::Agent;

/// Performs one JSON POST and returns the decoded response document.
pub trait Transport {
    fn post_json(&mut self, url: &str, body: &Value) -> Result<Value, ProvisionError>;
}

/// Blocking ureq transport with TLS certificate verification disabled.
pub struct HttpTransport {
    agent: Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        let config = Agent::config_builder()
            .tls_config(TlsConfig::builder().disable_verification(true).build())
            .build();
        Self {
            agent: Agent::new_with_config(config),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn post_json(&mut self, url: &str, body: &Value) -> Result<Value, ProvisionError> {
        let start = Instant::now();
        let transport_err = |source: ureq::Error| ProvisionError::Transport {
            url: url.to_string(),
            source: Box::new(source),
        };
        let mut response = match self
            .agent
            .post(url)
            .header("Content-Type", "application/json")
            .send_json(body)
        {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => {
                tracing::warn!(status = code, url, "stage request rejected");
                return Err(ProvisionError::Status {
                    url: url.to_string(),
                    code,
                });
            }
            Err(err) => return Err(transport_err(err)),
        };
        tracing::info!(
            status = response.status().as_u16(),
            url,
            elapsed_ms = start.elapsed().as_millis(),
            "stage request complete"
        );
        response
            .body_mut()
            .read_json::<Value>()
            .map_err(transport_err)
    }
}
