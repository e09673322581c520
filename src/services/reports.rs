//! Inventory reporting: stock summary, reservation statistics, and the
//! audit-trail query. Read-only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::DbPool;
use crate::entities::{
    order_reservation::Entity as OrderReservationEntity,
    warehouse_item::{self, Entity as WarehouseItemEntity},
    warehouse_operation::{self, Entity as WarehouseOperationEntity},
};
use crate::errors::ServiceError;

/// Per-item line of the inventory summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: i64,
    pub name: String,
    pub on_hand: i32,
    pub reserved: i64,
    pub effective_available: i64,
    pub min_quantity: i32,
    pub low_stock: bool,
    /// On-hand quantity valued at cost price.
    pub stock_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_items: u64,
    pub total_stock_value: Decimal,
    pub low_stock_count: u64,
    pub items_with_reservations: u64,
    pub items: Vec<ItemSummary>,
    pub generated_at: DateTime<Utc>,
}

/// Aggregate statistics about outstanding reservations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationStats {
    pub total_reservations: u64,
    pub orders_with_reservations: u64,
    pub total_reserved_units: i64,
    pub stats_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ReportsService {
    db_pool: Arc<DbPool>,
}

impl ReportsService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Full warehouse snapshot: per-item on-hand/reserved/effective numbers
    /// plus the aggregate counts the reporting endpoint displays.
    #[instrument(skip(self))]
    pub async fn get_inventory_summary(&self) -> Result<InventorySummary, ServiceError> {
        let db = &*self.db_pool;

        let items = WarehouseItemEntity::find()
            .order_by_asc(warehouse_item::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let reservations = OrderReservationEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut reserved: HashMap<i64, i64> = HashMap::new();
        for row in &reservations {
            *reserved.entry(row.warehouse_item_id).or_insert(0) += row.quantity as i64;
        }

        let mut total_stock_value = Decimal::ZERO;
        let mut low_stock_count = 0u64;
        let mut items_with_reservations = 0u64;
        let mut summaries = Vec::with_capacity(items.len());

        for item in items {
            let reserved_qty = reserved.get(&item.id).copied().unwrap_or(0);
            let stock_value = Decimal::from(item.quantity) * item.cost_price;
            let low_stock = item.is_low_stock();

            total_stock_value += stock_value;
            if low_stock {
                low_stock_count += 1;
            }
            if reserved_qty > 0 {
                items_with_reservations += 1;
            }

            summaries.push(ItemSummary {
                id: item.id,
                name: item.name,
                on_hand: item.quantity,
                reserved: reserved_qty,
                effective_available: item.quantity as i64 - reserved_qty,
                min_quantity: item.min_quantity,
                low_stock,
                stock_value,
            });
        }

        Ok(InventorySummary {
            total_items: summaries.len() as u64,
            total_stock_value,
            low_stock_count,
            items_with_reservations,
            items: summaries,
            generated_at: Utc::now(),
        })
    }

    /// Aggregate reservation counts for dashboards.
    #[instrument(skip(self))]
    pub async fn get_reservation_stats(&self) -> Result<ReservationStats, ServiceError> {
        let db = &*self.db_pool;

        let reservations = OrderReservationEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let orders: HashSet<_> = reservations.iter().map(|r| r.order_id).collect();
        let total_units: i64 = reservations.iter().map(|r| r.quantity as i64).sum();

        Ok(ReservationStats {
            total_reservations: reservations.len() as u64,
            orders_with_reservations: orders.len() as u64,
            total_reserved_units: total_units,
            stats_at: Utc::now(),
        })
    }

    /// Lists the audit trail for a warehouse item, newest first.
    #[instrument(skip(self))]
    pub async fn list_operations(
        &self,
        warehouse_item_id: i64,
        limit: u64,
    ) -> Result<Vec<warehouse_operation::Model>, ServiceError> {
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let operations = WarehouseOperationEntity::find()
            .filter(warehouse_operation::Column::WarehouseItemId.eq(warehouse_item_id))
            .order_by_desc(warehouse_operation::Column::CreatedAt)
            .limit(limit)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(operations)
    }
}
