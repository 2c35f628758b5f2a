use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PaymentMethod;

/// Amounts received per payment method. A missing amount counts as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentAmounts {
    #[serde(default)]
    pub yape: Option<Decimal>,
    #[serde(default)]
    pub plin: Option<Decimal>,
    #[serde(default)]
    pub transfer: Option<Decimal>,
    #[serde(default)]
    pub card: Option<Decimal>,
    #[serde(default)]
    pub cash: Option<Decimal>,
}

/// Ad-hoc expenses charged against a single procedure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcedureExpenses {
    #[serde(default)]
    pub material_expense: Option<Decimal>,
    #[serde(default)]
    pub fuel_expense: Option<Decimal>,
    #[serde(default)]
    pub extra_service_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureRecord {
    pub id: Uuid,
    /// ISO date or date-time exactly as entered.
    pub date: String,
    pub patient_id: Option<Uuid>,
    pub catalog_item_id: Option<Uuid>,
    pub quantity: i32,
    pub payments: PaymentAmounts,
    pub expenses: ProcedureExpenses,
    /// `None` means "not computed", which is distinct from a zero profit.
    pub utility: Option<Decimal>,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Create/update payload. Any caller-supplied utility is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureInput {
    pub date: String,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub catalog_item_id: Option<Uuid>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub payments: PaymentAmounts,
    #[serde(default)]
    pub expenses: ProcedureExpenses,
    #[serde(default)]
    pub note: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

impl PaymentAmounts {
    /// The single-payment convention: one method carries the whole amount.
    pub fn single(method: PaymentMethod, amount: Decimal) -> Self {
        let mut payments = Self::default();
        payments.set(method, Some(amount));
        payments
    }

    pub fn get(&self, method: PaymentMethod) -> Option<Decimal> {
        match method {
            PaymentMethod::Yape => self.yape,
            PaymentMethod::Plin => self.plin,
            PaymentMethod::Transfer => self.transfer,
            PaymentMethod::Card => self.card,
            PaymentMethod::Cash => self.cash,
        }
    }

    pub fn set(&mut self, method: PaymentMethod, amount: Option<Decimal>) {
        let slot = match method {
            PaymentMethod::Yape => &mut self.yape,
            PaymentMethod::Plin => &mut self.plin,
            PaymentMethod::Transfer => &mut self.transfer,
            PaymentMethod::Card => &mut self.card,
            PaymentMethod::Cash => &mut self.cash,
        };
        *slot = amount;
    }
}
