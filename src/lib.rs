//! bloomstock — inventory reservation & availability engine.
//!
//! Converts a bill-of-materials model of finished products built from raw
//! warehouse items into availability checks, order-scoped reservations,
//! fulfillment-time deductions with an audit trail, and a cleanup sweep for
//! abandoned holds. Consumed as a library by the shop's HTTP and bot layers.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use uuid::Uuid;

pub use crate::config::AppConfig;
pub use crate::db::DbPool;
pub use crate::errors::ServiceError;
pub use crate::events::{Event, EventSender};
pub use crate::services::availability::{
    AvailabilityResult, BatchAvailabilityResult, ItemRequest, ShortfallKind, ShortfallReason,
};
pub use crate::services::cleanup::CleanupStats;
pub use crate::services::reports::{InventorySummary, ReservationStats};
pub use crate::services::reservations::ReservationDetail;

use crate::entities::warehouse_operation;
use crate::services::{
    AvailabilityService, CleanupService, DeductionService, ReportsService, ReservationService,
};

/// One-stop handle over the engine's services, for hosts that don't need to
/// wire the services individually.
#[derive(Clone)]
pub struct InventoryEngine {
    pub availability: AvailabilityService,
    pub reservations: ReservationService,
    pub deductions: DeductionService,
    pub cleanup: CleanupService,
    pub reports: ReportsService,
}

impl InventoryEngine {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            availability: AvailabilityService::new(db_pool.clone()),
            reservations: ReservationService::new(db_pool.clone(), event_sender.clone()),
            deductions: DeductionService::new(db_pool.clone(), event_sender.clone()),
            cleanup: CleanupService::new(db_pool.clone(), event_sender),
            reports: ReportsService::new(db_pool),
        }
    }

    pub async fn check_availability(
        &self,
        product_id: i64,
        quantity: i32,
    ) -> Result<AvailabilityResult, ServiceError> {
        self.availability
            .check_availability(product_id, quantity)
            .await
    }

    pub async fn check_batch_availability(
        &self,
        items: &[ItemRequest],
    ) -> Result<BatchAvailabilityResult, ServiceError> {
        self.availability.check_batch_availability(items).await
    }

    pub async fn create_reservation(
        &self,
        order_id: Uuid,
        items: &[ItemRequest],
        validate: bool,
    ) -> Result<Vec<entities::order_reservation::Model>, ServiceError> {
        self.reservations
            .create_reservations(order_id, items, validate)
            .await
    }

    pub async fn release_reservations(&self, order_id: Uuid) -> Result<u64, ServiceError> {
        self.reservations.release_reservations(order_id).await
    }

    pub async fn convert_reservations_to_deductions(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<warehouse_operation::Model>, ServiceError> {
        self.deductions
            .convert_reservations_to_deductions(order_id)
            .await
    }

    pub async fn get_inventory_summary(&self) -> Result<InventorySummary, ServiceError> {
        self.reports.get_inventory_summary().await
    }

    pub async fn cleanup_expired_reservations(
        &self,
        max_age_hours: i64,
        dry_run: bool,
    ) -> Result<CleanupStats, ServiceError> {
        self.cleanup
            .cleanup_expired_reservations(max_age_hours, dry_run)
            .await
    }
}

/// Installs a global tracing subscriber honoring `RUST_LOG`. Embedding hosts
/// usually bring their own; tests and small tools call this.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
