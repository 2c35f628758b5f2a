use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lab exam offered for home sampling. `price` is free text as typed by
/// staff, e.g. `"S/ 1,234.50"`; it is parsed only when quoting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabExam {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub price: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabExamInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub price: String,
}
