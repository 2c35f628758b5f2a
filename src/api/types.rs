//! Shared types for the API layer.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::Page;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// `?page=&per_page=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// `None` when neither parameter was given.
    pub fn page(&self) -> Option<Page> {
        if self.page.is_none() && self.per_page.is_none() {
            return None;
        }
        let default = Page::default();
        Some(Page::new(
            self.page.unwrap_or(default.page),
            self.per_page.unwrap_or(default.per_page),
        ))
    }
}

/// Parse a path id, mapping garbage to 400.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {what} ID: {e}")))
}
