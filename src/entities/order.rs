use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states of an order, owned by the external order state machine.
/// The engine only reads them: `Assembled` triggers deduction conversion and
/// the sweep-eligible states mark reservations as abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Paid,
    Assembled,
    Completed,
    Cancelled,
    Deleted,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Paid => "paid",
            OrderStatus::Assembled => "assembled",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(OrderStatus::New),
            "paid" => Some(OrderStatus::Paid),
            "assembled" => Some(OrderStatus::Assembled),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            "deleted" => Some(OrderStatus::Deleted),
            _ => None,
        }
    }

    /// States in which an old reservation is almost certainly abandoned.
    pub fn is_sweep_eligible(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::order_reservation::Entity")]
    OrderReservation,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::order_reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderReservation.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        } else {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
