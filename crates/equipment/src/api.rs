//! REST client for the controller bridge.
//!
//! Wraps the bridge HTTP endpoints (enroll, remove, week-plan template,
//! work schedule, health) using [`reqwest`]. A command only succeeds when
//! the HTTP status is 2xx *and* the body reports `code == 201`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::gateway::EquipmentGateway;
use crate::messages::{
    AddAccessRequest, ControllerResponse, RemoveAccessRequest, WeekPlanTemplateRequest,
    WorkScheduleRequest, CODE_ACCEPTED,
};

/// Errors from the controller bridge. Every variant names the device IP.
#[derive(Debug, thiserror::Error)]
pub enum EquipmentError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("Request to equipment {ip} failed: {source}")]
    Request {
        ip: String,
        #[source]
        source: reqwest::Error,
    },

    /// The call exceeded its time bound.
    #[error("Request to equipment {ip} timed out")]
    Timeout { ip: String },

    /// The bridge answered but did not accept the command.
    #[error("Equipment {ip} rejected the command (status {status}, code {code:?}): {body}")]
    Rejected {
        ip: String,
        status: u16,
        code: Option<i64>,
        body: String,
    },

    /// The client could not be constructed.
    #[error("Invalid equipment client configuration: {0}")]
    Config(String),
}

impl EquipmentError {
    pub fn ip(&self) -> Option<&str> {
        match self {
            EquipmentError::Request { ip, .. }
            | EquipmentError::Timeout { ip }
            | EquipmentError::Rejected { ip, .. } => Some(ip),
            EquipmentError::Config(_) => None,
        }
    }

    fn from_reqwest(ip: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            EquipmentError::Timeout { ip: ip.to_string() }
        } else {
            EquipmentError::Request {
                ip: ip.to_string(),
                source,
            }
        }
    }
}

/// HTTP client for the controller bridge.
#[derive(Clone)]
pub struct EquipmentApi {
    client: reqwest::Client,
    api_url: String,
}

impl EquipmentApi {
    /// Create a client whose every call is bounded by `timeout`.
    ///
    /// * `api_url` - Base HTTP URL of the bridge, e.g. `http://bridge:8080`.
    pub fn new(api_url: String, timeout: Duration) -> Result<Self, EquipmentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EquipmentError::Config(e.to_string()))?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    // ---- private helpers ----

    /// POST a command and require an accepted controller response.
    async fn command<B: Serialize + Sync>(
        &self,
        path: &str,
        ip: &str,
        body: &B,
    ) -> Result<(), EquipmentError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_url))
            .json(body)
            .send()
            .await
            .map_err(|e| EquipmentError::from_reqwest(ip, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EquipmentError::from_reqwest(ip, e))?;

        let code = serde_json::from_str::<ControllerResponse>(&text)
            .ok()
            .map(|r| r.code);

        if status.is_success() && code == Some(CODE_ACCEPTED) {
            tracing::debug!(ip, path, "Equipment accepted command");
            return Ok(());
        }

        Err(EquipmentError::Rejected {
            ip: ip.to_string(),
            status: status.as_u16(),
            code,
            body: text,
        })
    }
}

#[async_trait]
impl EquipmentGateway for EquipmentApi {
    async fn add_access(&self, request: &AddAccessRequest) -> Result<(), EquipmentError> {
        self.command("/add", &request.ip, request).await
    }

    async fn remove_access(&self, request: &RemoveAccessRequest) -> Result<(), EquipmentError> {
        self.command("/delete", &request.ip, request).await
    }

    async fn add_week_plan_template(
        &self,
        request: &WeekPlanTemplateRequest,
    ) -> Result<(), EquipmentError> {
        self.command("/add-user-right-week-plan-template", &request.ip, request)
            .await
    }

    async fn add_work_schedule(&self, request: &WorkScheduleRequest) -> Result<(), EquipmentError> {
        // The bridge vendor reuses `/delete` for schedule registration.
        self.command("/delete", &request.ip, request).await
    }

    async fn health_check(&self, ip: &str) -> Result<(), EquipmentError> {
        let response = self
            .client
            .get(format!("{}/health", self.api_url))
            .query(&[("ip", ip)])
            .send()
            .await
            .map_err(|e| EquipmentError::from_reqwest(ip, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(EquipmentError::Rejected {
            ip: ip.to_string(),
            status: status.as_u16(),
            code: None,
            body,
        })
    }
}
