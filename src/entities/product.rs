use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A sellable product (bouquet, arrangement). Catalog CRUD lives outside the
/// engine; availability checks only read `is_enabled` and the recipe lines.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub is_enabled: bool,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_recipe::Entity")]
    ProductRecipe,
}

impl Related<super::product_recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductRecipe.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
