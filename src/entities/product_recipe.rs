use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One bill-of-materials line: a product consumes `quantity_per_unit` of a
/// warehouse item per unit sold. Optional lines (garnish, packaging) are
/// excluded from sufficiency checks and from deduction.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_recipes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub product_id: i64,
    pub warehouse_item_id: i64,
    pub quantity_per_unit: i32,
    pub is_optional: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::warehouse_item::Entity",
        from = "Column::WarehouseItemId",
        to = "super::warehouse_item::Column::Id"
    )]
    WarehouseItem,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::warehouse_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WarehouseItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
