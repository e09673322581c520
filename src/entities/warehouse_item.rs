use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A raw material held in the warehouse (e.g. a rose stem, a ribbon spool).
///
/// `quantity` is the authoritative on-hand count. It is decremented only by
/// the deduction converter; reservations never touch it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouse_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub quantity: i32,
    pub min_quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub cost_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub retail_price: Decimal,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_recipe::Entity")]
    ProductRecipe,
    #[sea_orm(has_many = "super::order_reservation::Entity")]
    OrderReservation,
    #[sea_orm(has_many = "super::warehouse_operation::Entity")]
    WarehouseOperation,
}

impl Related<super::product_recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductRecipe.def()
    }
}

impl Related<super::order_reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderReservation.def()
    }
}

impl Related<super::warehouse_operation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WarehouseOperation.def()
    }
}

impl Model {
    /// True when on-hand stock has fallen to or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

impl ActiveModelBehavior for ActiveModel {}
