use serde::Deserialize;
use uuid::Uuid;

/// Offset pagination shared by list queries.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub const MAX_PER_PAGE: u32 = 200;

    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, Self::MAX_PER_PAGE))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, per_page: 50 }
    }
}

#[derive(Debug, Default)]
pub struct CatalogFilter {
    pub active_only: bool,
    pub name_contains: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProcedureFilter {
    /// Inclusive lower bound, compared as ISO strings.
    pub date_from: Option<String>,
    /// Inclusive upper bound on the day key (first 10 chars).
    pub date_to: Option<String>,
    pub patient_id: Option<Uuid>,
    pub catalog_item_id: Option<Uuid>,
    pub page: Option<Page>,
}

#[derive(Debug, Default)]
pub struct PatientFilter {
    pub name_contains: Option<String>,
    pub active_only: bool,
    pub page: Option<Page>,
}
