//! Deduction Converter
//!
//! Turns an order's reservations into permanent warehouse decrements at
//! assembly time, writing one audit row per item touched. Orders that predate
//! the reservation ledger fall back to recomputing requirements from their
//! line items; both paths share the same verify/decrement/audit core.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    order::{self, Entity as OrderEntity},
    order_item::{self, Entity as OrderItemEntity},
    order_reservation::{self, Entity as OrderReservationEntity},
    warehouse_item::{self, Entity as WarehouseItemEntity},
    warehouse_operation::{self, OperationType},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::availability::expand_requirements;

/// Where the per-item deduction quantities come from.
///
/// The normal path consumes the order's reservation rows. Orders with no
/// reservations on record (created before the ledger existed, or with
/// reservation creation skipped) recompute requirements from their line
/// items against the current recipes.
pub enum DeductionSource {
    FromReservations(Vec<order_reservation::Model>),
    FromOrderItems(BTreeMap<i64, i64>),
}

impl DeductionSource {
    /// Total units to deduct per warehouse item, ordered by item id.
    fn requirements(&self) -> BTreeMap<i64, i64> {
        match self {
            DeductionSource::FromReservations(reservations) => {
                let mut required: BTreeMap<i64, i64> = BTreeMap::new();
                for reservation in reservations {
                    *required.entry(reservation.warehouse_item_id).or_insert(0) +=
                        reservation.quantity as i64;
                }
                required
            }
            DeductionSource::FromOrderItems(required) => required.clone(),
        }
    }

    /// Reservation rows consumed by the conversion, to be deleted on success.
    fn reservation_ids(&self) -> Vec<Uuid> {
        match self {
            DeductionSource::FromReservations(reservations) => {
                reservations.iter().map(|r| r.id).collect()
            }
            DeductionSource::FromOrderItems(_) => Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct DeductionService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl DeductionService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Converts an order's reservations into permanent stock deductions.
    ///
    /// Invoked once per order when it transitions into its assembled state.
    /// The whole conversion is one transaction: every item is re-verified
    /// against current on-hand stock first (stock can have been adjusted
    /// out-of-band since the hold was taken), and any shortfall aborts the
    /// entire call with nothing deducted and no reservation deleted.
    ///
    /// Returns the audit rows written, one per warehouse item touched.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn convert_reservations_to_deductions(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<warehouse_operation::Model>, ServiceError> {
        let db = &*self.db_pool;

        let (operations, low_stock) = db
            .transaction::<_, (Vec<warehouse_operation::Model>, Vec<(i64, i32, i32)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let order_row = OrderEntity::find_by_id(order_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!("Order {} not found", order_id))
                            })?;

                        let source = load_deduction_source(txn, &order_row).await?;
                        apply_deductions(txn, &order_row, &source).await
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        info!(
            order_id = %order_id,
            operations = operations.len(),
            "Converted reservations to stock deductions"
        );

        if !operations.is_empty() {
            self.event_sender
                .send_or_log(Event::StockDeducted {
                    order_id,
                    operations: operations.len(),
                })
                .await;
        }

        for (warehouse_item_id, quantity, min_quantity) in low_stock {
            self.event_sender
                .send_or_log(Event::LowStock {
                    warehouse_item_id,
                    quantity,
                    min_quantity,
                })
                .await;
        }

        Ok(operations)
    }
}

/// Picks the deduction source for an order: its reservation rows when any
/// exist, otherwise the legacy recomputation from order line items.
async fn load_deduction_source<C: ConnectionTrait>(
    txn: &C,
    order_row: &order::Model,
) -> Result<DeductionSource, ServiceError> {
    let reservations = OrderReservationEntity::find()
        .filter(order_reservation::Column::OrderId.eq(order_row.id))
        .all(txn)
        .await
        .map_err(ServiceError::db_error)?;

    if !reservations.is_empty() {
        return Ok(DeductionSource::FromReservations(reservations));
    }

    warn!(
        order_id = %order_row.id,
        order_number = %order_row.order_number,
        "No reservations on record; recomputing requirements from order items"
    );

    let items = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_row.id))
        .all(txn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut requests: BTreeMap<i64, i32> = BTreeMap::new();
    for item in items {
        *requests.entry(item.product_id).or_insert(0) += item.quantity;
    }

    let required = expand_requirements(txn, &requests).await?;
    Ok(DeductionSource::FromOrderItems(required))
}

/// The shared conversion core: verify every item, decrement stock, write one
/// audit row per item, delete consumed reservations. Runs entirely inside
/// the caller's transaction.
async fn apply_deductions<C: ConnectionTrait>(
    txn: &C,
    order_row: &order::Model,
    source: &DeductionSource,
) -> Result<(Vec<warehouse_operation::Model>, Vec<(i64, i32, i32)>), ServiceError> {
    let requirements = source.requirements();
    if requirements.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let item_ids: Vec<i64> = requirements.keys().copied().collect();
    let items: BTreeMap<i64, warehouse_item::Model> = WarehouseItemEntity::find()
        .filter(warehouse_item::Column::Id.is_in(item_ids))
        .order_by_asc(warehouse_item::Column::Id)
        .lock_exclusive()
        .all(txn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|item| (item.id, item))
        .collect();

    let now = Utc::now();
    let mut operations = Vec::with_capacity(requirements.len());
    let mut low_stock = Vec::new();

    for (&warehouse_item_id, &required) in &requirements {
        let item = items.get(&warehouse_item_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Warehouse item {} not found", warehouse_item_id))
        })?;

        // Last-moment safety check; kept in place even with row locking on
        // the reservation path.
        if (item.quantity as i64) < required {
            return Err(ServiceError::InsufficientStock(format!(
                "warehouse item '{}': need {}, have {}",
                item.name, required, item.quantity
            )));
        }

        let deducted = required as i32;
        let new_balance = item.quantity - deducted;

        let mut active: warehouse_item::ActiveModel = item.clone().into();
        active.quantity = Set(new_balance);
        active.version = Set(item.version + 1);
        active.updated_at = Set(Some(now));
        active.update(txn).await.map_err(ServiceError::db_error)?;

        let operation = warehouse_operation::ActiveModel {
            warehouse_item_id: Set(warehouse_item_id),
            operation_type: Set(OperationType::Sale.as_str().to_string()),
            quantity_change: Set(-deducted),
            balance_after: Set(new_balance),
            description: Set(format!("Sale for order {}", order_row.order_number)),
            order_id: Set(Some(order_row.id)),
            created_at: Set(now),
            ..Default::default()
        };

        let operation = operation
            .insert(txn)
            .await
            .map_err(ServiceError::db_error)?;
        operations.push(operation);

        if new_balance <= item.min_quantity {
            low_stock.push((warehouse_item_id, new_balance, item.min_quantity));
        }
    }

    // The holds have become permanent facts; drop them.
    let reservation_ids = source.reservation_ids();
    if !reservation_ids.is_empty() {
        OrderReservationEntity::delete_many()
            .filter(order_reservation::Column::Id.is_in(reservation_ids))
            .exec(txn)
            .await
            .map_err(ServiceError::db_error)?;
    }

    Ok((operations, low_stock))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_source_sums_per_item() {
        let order_id = Uuid::new_v4();
        let rows = vec![
            order_reservation::Model {
                id: Uuid::new_v4(),
                order_id,
                warehouse_item_id: 5,
                quantity: 12,
                created_at: Utc::now(),
            },
            order_reservation::Model {
                id: Uuid::new_v4(),
                order_id,
                warehouse_item_id: 2,
                quantity: 8,
                created_at: Utc::now(),
            },
        ];

        let source = DeductionSource::FromReservations(rows);
        let required = source.requirements();
        assert_eq!(required[&2], 8);
        assert_eq!(required[&5], 12);
        assert_eq!(source.reservation_ids().len(), 2);
    }

    #[test]
    fn order_items_source_has_no_reservations_to_delete() {
        let source = DeductionSource::FromOrderItems(BTreeMap::from([(3, 6)]));
        assert!(source.reservation_ids().is_empty());
        assert_eq!(source.requirements()[&3], 6);
    }
}
