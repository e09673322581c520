//! Cleanup Sweeper
//!
//! Backstop for reservation leaks: callers are supposed to pair every
//! reservation with a release or a conversion, but a crash between order
//! creation and its resolution leaves holds behind that would starve future
//! availability checks. A scheduled job runs this sweep periodically.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::db::DbPool;
use crate::entities::{
    order::{self, Entity as OrderEntity, OrderStatus},
    order_reservation::{self, Entity as OrderReservationEntity},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Result of one cleanup sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupStats {
    /// Distinct orders holding abandoned reservations.
    pub orders_found: u64,
    /// Abandoned reservation rows found.
    pub reservations_found: u64,
    /// Rows actually deleted (always zero on a dry run).
    pub reservations_deleted: u64,
    /// Orders created before this instant were considered.
    pub cutoff: DateTime<Utc>,
    pub swept_at: DateTime<Utc>,
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct CleanupService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl CleanupService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Finds reservations whose parent order is older than `max_age_hours`
    /// and still in a state where the hold is almost certainly abandoned
    /// (never paid, or cancelled). Reports counts; deletes unless `dry_run`.
    #[instrument(skip(self))]
    pub async fn cleanup_expired_reservations(
        &self,
        max_age_hours: i64,
        dry_run: bool,
    ) -> Result<CleanupStats, ServiceError> {
        if max_age_hours <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "max_age_hours must be positive, got {}",
                max_age_hours
            )));
        }

        let db = &*self.db_pool;
        let swept_at = Utc::now();
        let cutoff = swept_at - Duration::hours(max_age_hours);

        let abandoned = OrderReservationEntity::find()
            .find_also_related(OrderEntity)
            .filter(order::Column::CreatedAt.lt(cutoff))
            .filter(order::Column::Status.is_in([
                OrderStatus::New.as_str(),
                OrderStatus::Cancelled.as_str(),
            ]))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let orders: HashSet<_> = abandoned
            .iter()
            .map(|(reservation, _)| reservation.order_id)
            .collect();
        let reservation_ids: Vec<_> = abandoned
            .iter()
            .map(|(reservation, _)| reservation.id)
            .collect();

        let orders_found = orders.len() as u64;
        let reservations_found = reservation_ids.len() as u64;

        let reservations_deleted = if dry_run || reservation_ids.is_empty() {
            0
        } else {
            OrderReservationEntity::delete_many()
                .filter(order_reservation::Column::Id.is_in(reservation_ids))
                .exec(db)
                .await
                .map_err(ServiceError::db_error)?
                .rows_affected
        };

        info!(
            orders_found,
            reservations_found, reservations_deleted, dry_run, "Completed reservation cleanup sweep"
        );

        if reservations_deleted > 0 {
            self.event_sender
                .send_or_log(Event::ReservationsSwept {
                    orders: orders_found,
                    reservations: reservations_deleted,
                })
                .await;
        }

        Ok(CleanupStats {
            orders_found,
            reservations_found,
            reservations_deleted,
            cutoff,
            swept_at,
            dry_run,
        })
    }
}
