//! reqwest implementation of [`AppearanceService`].
//!
//! Capabilities are plain URLs handed out by the simulator. An unset URL
//! means the region does not offer the capability.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::errors::SyncError;
use crate::domain::models::ServerConfig;
use crate::domain::ports::{AppearanceService, AppearanceUpdateResponse};

const UPDATE_APPEARANCE: &str = "UpdateAvatarAppearance";
const INCREMENT_COF_VERSION: &str = "IncrementCOFVersion";

#[derive(Debug, Serialize)]
struct UpdateAppearanceRequest {
    cof_version: i64,
}

#[derive(Debug, Deserialize)]
struct IncrementResponse {
    category: IncrementedCategory,
}

#[derive(Debug, Deserialize)]
struct IncrementedCategory {
    version: i64,
}

pub struct HttpAppearanceService {
    http_client: ReqwestClient,
    update_appearance_url: Option<String>,
    increment_cof_version_url: Option<String>,
}

impl HttpAppearanceService {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            update_appearance_url: config.update_appearance_url.clone(),
            increment_cof_version_url: config.increment_cof_version_url.clone(),
        })
    }
}

fn map_transport_error(err: &reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else {
        SyncError::Network(err.to_string())
    }
}

async fn error_from_response(response: reqwest::Response) -> SyncError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());
    SyncError::Http { status, body }
}

#[async_trait]
impl AppearanceService for HttpAppearanceService {
    #[instrument(skip(self))]
    async fn update_appearance(&self, cof_version: i64) -> Result<AppearanceUpdateResponse, SyncError> {
        let url = self
            .update_appearance_url
            .as_deref()
            .ok_or(SyncError::MissingCapability(UPDATE_APPEARANCE))?;

        let response = self
            .http_client
            .post(url)
            .json(&UpdateAppearanceRequest { cof_version })
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;

        match response.status() {
            StatusCode::CONFLICT => {
                let body: AppearanceUpdateResponse = response.json().await.unwrap_or_default();
                warn!(cof_version, expected = ?body.expected, observed = ?body.observed, "appearance update conflict");
                Err(SyncError::Conflict {
                    expected: body.expected,
                    observed: body.observed,
                })
            }
            status if status.is_success() => {
                let body: AppearanceUpdateResponse = response
                    .json()
                    .await
                    .map_err(|e| SyncError::InvalidResponse(e.to_string()))?;
                debug!(cof_version, success = body.success, "appearance update answered");
                Ok(body)
            }
            _ => Err(error_from_response(response).await),
        }
    }

    #[instrument(skip(self))]
    async fn increment_cof_version(&self) -> Result<i64, SyncError> {
        let url = self
            .increment_cof_version_url
            .as_deref()
            .ok_or(SyncError::MissingCapability(INCREMENT_COF_VERSION))?;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: IncrementResponse = response
            .json()
            .await
            .map_err(|e| SyncError::InvalidResponse(e.to_string()))?;
        debug!(version = body.category.version, "COF version incremented server-side");
        Ok(body.category.version)
    }
}
