//! Points of sale (PDV).

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PointOfSale {
    pub pos_id: i64,
    pub name: String,
    pub city: String,
    pub user_id: Option<i64>,
}

impl PointOfSale {
    /// Label used in the "paid by" field for payments made at this PDV.
    pub fn payer_label(&self) -> String {
        format!("PDV - {}", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct CreatePointOfSale {
    pub name: String,
    pub city: String,
    pub user_id: Option<i64>,
}
