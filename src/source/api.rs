use std::time::Duration;
use tracing::{debug, info};
use ureq::http::Response;
use ureq::{Agent, Body};

use super::{parse_invoices, DateRange, InvoiceSource};
use crate::error::SourceError;
use crate::invoice::Invoice;

const TOKEN_PATH: &str = "/api/token/";
const INVOICES_PATH: &str = "/integraciones/api/facturas";
const BUNDLE_PATH: &str = "/integraciones/api/export_dbf";
const BUNDLE_LIMIT: u64 = 256 * 1024 * 1024;

/// HTTP client for the accounting API
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    agent: Agent,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            agent,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange credentials for an access token and keep it for later calls
    pub fn login(&mut self, email: &str, password: &str) -> Result<String, SourceError> {
        let url = self.url(TOKEN_PATH);
        let payload = serde_json::json!({ "email": email, "password": password });

        let body = self
            .agent
            .post(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .send(payload.to_string())
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|source| SourceError::Http {
                url: url.clone(),
                source,
            })?;

        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| SourceError::UnexpectedResponse {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        let access = json["access"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or(SourceError::MissingToken)?
            .to_string();

        info!(email, "logged in");
        self.token = Some(access.clone());
        Ok(access)
    }

    fn get(&self, url: &str, range: &DateRange) -> Result<Response<Body>, SourceError> {
        let mut request = self.agent.get(url).header("Accept", "application/json");
        for (key, value) in range.query_params() {
            request = request.query(key, value);
        }
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        debug!(url, from = %range.from, to = %range.to, "requesting");
        request.call().map_err(|source| SourceError::Http {
            url: url.to_string(),
            source,
        })
    }
}

impl InvoiceSource for ApiClient {
    fn fetch(&self, range: &DateRange) -> Result<Vec<Invoice>, SourceError> {
        let url = self.url(INVOICES_PATH);
        let body = self
            .get(&url, range)?
            .body_mut()
            .read_to_string()
            .map_err(|source| SourceError::Http {
                url: url.clone(),
                source,
            })?;

        let invoices = parse_invoices(&body).map_err(|e| SourceError::UnexpectedResponse {
            url: url.clone(),
            reason: format!("unexpected invoice list format: {e}"),
        })?;
        info!(count = invoices.len(), "fetched invoices");
        Ok(invoices)
    }

    fn download_prebuilt_bundle(&self, range: &DateRange) -> Result<Vec<u8>, SourceError> {
        let url = self.url(BUNDLE_PATH);
        let bytes = self
            .get(&url, range)?
            .body_mut()
            .with_config()
            .limit(BUNDLE_LIMIT)
            .read_to_vec()
            .map_err(|source| SourceError::Http {
                url: url.clone(),
                source,
            })?;

        info!(bytes = bytes.len(), "downloaded bundle");
        Ok(bytes)
    }
}
