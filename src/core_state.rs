//! Application state shared by every HTTP handler.
//!
//! Handlers open a short-lived SQLite connection per request through
//! `open_db()`; nothing holds a connection across requests.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AppConfig, QuoteConfig};
use crate::db;
use crate::report::{HttpReportRpc, ReportRpc};
use crate::search::SearchRegistry;

pub struct CoreState {
    pub db_path: PathBuf,
    pub quote: QuoteConfig,
    /// Remote report aggregation, when configured.
    pub rpc: Option<Arc<dyn ReportRpc>>,
    /// Patient typeahead: only each client's latest query is answered.
    pub patient_search: SearchRegistry,
}

impl CoreState {
    /// Build state from config and make sure the database is migrated.
    pub fn new(config: &AppConfig) -> Result<Self, CoreError> {
        // Opening runs pending migrations.
        db::open_database(&config.db_path)?;
        tracing::info!(path = %config.db_path.display(), "Database ready");

        let rpc: Option<Arc<dyn ReportRpc>> = match &config.rpc {
            Some(rpc_config) => match HttpReportRpc::new(rpc_config) {
                Ok(client) => {
                    tracing::info!(url = %rpc_config.base_url, "Remote report aggregation enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Remote report aggregation disabled");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            db_path: config.db_path.clone(),
            quote: config.quote.clone(),
            rpc,
            patient_search: SearchRegistry::default(),
        })
    }

    /// Replace the remote aggregation backend.
    pub fn with_rpc(mut self, rpc: Option<Arc<dyn ReportRpc>>) -> Self {
        self.rpc = rpc;
        self
    }

    /// Open a database connection for one request.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}
