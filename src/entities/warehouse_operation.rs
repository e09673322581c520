//! Append-only audit trail of stock changes.
//!
//! Every committed change to a warehouse item's on-hand quantity writes one
//! row here with the signed delta and the resulting balance. Rows are never
//! updated or deleted.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of stock movement recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Sale,
    Delivery,
    Writeoff,
    PriceChange,
    Inventory,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Sale => "sale",
            OperationType::Delivery => "delivery",
            OperationType::Writeoff => "writeoff",
            OperationType::PriceChange => "price_change",
            OperationType::Inventory => "inventory",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(OperationType::Sale),
            "delivery" => Some(OperationType::Delivery),
            "writeoff" => Some(OperationType::Writeoff),
            "price_change" => Some(OperationType::PriceChange),
            "inventory" => Some(OperationType::Inventory),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouse_operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub warehouse_item_id: i64,
    pub operation_type: String,
    /// Signed quantity delta; negative for outgoing stock.
    pub quantity_change: i32,
    /// On-hand balance immediately after the operation.
    pub balance_after: i32,
    pub description: String,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouse_item::Entity",
        from = "Column::WarehouseItemId",
        to = "super::warehouse_item::Column::Id"
    )]
    WarehouseItem,
}

impl Related<super::warehouse_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WarehouseItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_type_round_trips() {
        assert_eq!(OperationType::Sale.as_str(), "sale");
        assert_eq!(
            OperationType::from_str("price_change"),
            Some(OperationType::PriceChange)
        );
        assert_eq!(OperationType::from_str("refund"), None);
    }
}
