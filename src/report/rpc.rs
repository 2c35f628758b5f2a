//! Optional remote aggregation over a PostgREST-style RPC endpoint.
//!
//! The remote side returns pre-summed totals and a daily series. Local
//! aggregation stays authoritative: any failure here is logged and the
//! caller falls back to summing rows itself.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::config::RpcConfig;
use crate::models::enums::ReportMetric;

use super::aggregate::{DayBucket, ReportTotals};

/// Name of the remote aggregation function.
pub const REPORT_RPC_NAME: &str = "report_totals";

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Cannot reach RPC endpoint at {0}")]
    Connection(String),
    #[error("RPC request failed: {0}")]
    Http(String),
    #[error("RPC returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse RPC response: {0}")]
    ResponseParsing(String),
}

/// Arguments sent to the remote function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    pub metric: ReportMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteReport {
    pub totals: ReportTotals,
    #[serde(default)]
    pub by_day: Vec<DayBucket>,
}

/// Remote aggregation backend.
pub trait ReportRpc: Send + Sync {
    fn call<'a>(
        &'a self,
        name: &'a str,
        params: &'a RpcParams,
    ) -> BoxFuture<'a, Result<RemoteReport, RpcError>>;
}

/// `POST {base_url}/rest/v1/rpc/{name}` with an `apikey` header.
pub struct HttpReportRpc {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpReportRpc {
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Http(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    async fn post(&self, name: &str, params: &RpcParams) -> Result<RemoteReport, RpcError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, name);
        let mut request = self.client.post(&url).json(params);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                RpcError::Connection(self.base_url.clone())
            } else {
                RpcError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Status { status: status.as_u16(), body });
        }

        response
            .json::<RemoteReport>()
            .await
            .map_err(|e| RpcError::ResponseParsing(e.to_string()))
    }
}

impl ReportRpc for HttpReportRpc {
    fn call<'a>(
        &'a self,
        name: &'a str,
        params: &'a RpcParams,
    ) -> BoxFuture<'a, Result<RemoteReport, RpcError>> {
        Box::pin(self.post(name, params))
    }
}
