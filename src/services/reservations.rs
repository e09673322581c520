//! Reservation Manager
//!
//! Creates and releases reservation ledger rows. Creation runs in a single
//! transaction that locks the affected warehouse-item rows (ascending id
//! order) before re-validating availability, so two concurrent orders cannot
//! both pass the check and over-reserve a scarce item.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    order::Entity as OrderEntity,
    order_reservation::{self, Entity as OrderReservationEntity},
    warehouse_item::{self, Entity as WarehouseItemEntity},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::availability::{
    check_batch_on, coalesce_requests, expand_requirements, ItemRequest,
};

/// A reservation row joined with its warehouse item name, for display and
/// debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationDetail {
    pub id: Uuid,
    pub order_id: Uuid,
    pub warehouse_item_id: i64,
    pub warehouse_item_name: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ReservationService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl ReservationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates reservation rows for an order: one per distinct warehouse item
    /// consumed by the BOM-expanded request list. All-or-nothing; with
    /// `validate` set, availability is re-checked inside the transaction and
    /// any shortfall aborts the whole call with `InsufficientStock`.
    ///
    /// Reservations are a logical hold. On-hand stock is read here but never
    /// decremented.
    #[instrument(skip(self, items), fields(order_id = %order_id, items = items.len()))]
    pub async fn create_reservations(
        &self,
        order_id: Uuid,
        items: &[ItemRequest],
        validate: bool,
    ) -> Result<Vec<order_reservation::Model>, ServiceError> {
        for item in items {
            if item.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Requested quantity for product {} must be positive, got {}",
                    item.product_id, item.quantity
                )));
            }
        }

        let db = &*self.db_pool;
        let items_owned = items.to_vec();

        let created = db
            .transaction::<_, Vec<order_reservation::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    OrderEntity::find_by_id(order_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {} not found", order_id))
                        })?;

                    let (requests, _duplicates) = coalesce_requests(&items_owned);
                    let requirements = expand_requirements(txn, &requests).await?;

                    // Lock the touched warehouse rows for the rest of the
                    // transaction, in ascending id order to avoid deadlocks
                    // between concurrent multi-item reservations.
                    let item_ids: Vec<i64> = requirements.keys().copied().collect();
                    if !item_ids.is_empty() {
                        WarehouseItemEntity::find()
                            .filter(warehouse_item::Column::Id.is_in(item_ids))
                            .order_by_asc(warehouse_item::Column::Id)
                            .lock_exclusive()
                            .all(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                    }

                    if validate {
                        let batch = check_batch_on(txn, &items_owned).await?;
                        if !batch.available {
                            return Err(ServiceError::InsufficientStock(
                                batch.shortfall_summary(),
                            ));
                        }
                    }

                    let mut created = Vec::with_capacity(requirements.len());
                    for (warehouse_item_id, required) in requirements {
                        let quantity = i32::try_from(required).map_err(|_| {
                            ServiceError::ReservationError(format!(
                                "Required quantity {} for warehouse item {} overflows",
                                required, warehouse_item_id
                            ))
                        })?;

                        let reservation = order_reservation::ActiveModel {
                            order_id: Set(order_id),
                            warehouse_item_id: Set(warehouse_item_id),
                            quantity: Set(quantity),
                            ..Default::default()
                        };

                        let model = reservation
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        created.push(model);
                    }

                    Ok(created)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(
            order_id = %order_id,
            reservations = created.len(),
            "Created reservations for order"
        );

        self.event_sender
            .send_or_log(Event::ReservationsCreated {
                order_id,
                reservations: created.len(),
            })
            .await;

        Ok(created)
    }

    /// Deletes every reservation row for an order and returns the count.
    /// Idempotent: an order with no reservations releases zero.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn release_reservations(&self, order_id: Uuid) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;

        let result = OrderReservationEntity::delete_many()
            .filter(order_reservation::Column::OrderId.eq(order_id))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;

        let released = result.rows_affected;
        info!(order_id = %order_id, released, "Released reservations for order");

        if released > 0 {
            self.event_sender
                .send_or_log(Event::ReservationsReleased { order_id, released })
                .await;
        }

        Ok(released)
    }

    /// Returns the full reservation set for an order, joined with warehouse
    /// item names.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_reservations(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<ReservationDetail>, ServiceError> {
        let db = &*self.db_pool;

        let rows = OrderReservationEntity::find()
            .find_also_related(WarehouseItemEntity)
            .filter(order_reservation::Column::OrderId.eq(order_id))
            .order_by_asc(order_reservation::Column::WarehouseItemId)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        rows.into_iter()
            .map(|(reservation, item)| {
                let item = item.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Reservation {} references missing warehouse item {}",
                        reservation.id, reservation.warehouse_item_id
                    ))
                })?;
                Ok(ReservationDetail {
                    id: reservation.id,
                    order_id: reservation.order_id,
                    warehouse_item_id: reservation.warehouse_item_id,
                    warehouse_item_name: item.name,
                    quantity: reservation.quantity,
                    created_at: reservation.created_at,
                })
            })
            .collect()
    }
}
