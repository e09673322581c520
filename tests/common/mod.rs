//! Shared harness for integration tests: an engine backed by an in-memory
//! SQLite database with the crate's own migrations applied, plus seed
//! helpers for warehouse items, products, recipes and orders.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

use bloomstock::db::{self, DbConfig, DbPool};
use bloomstock::entities::{
    order::{self, OrderStatus},
    order_item, product, product_recipe,
    warehouse_item::{self, Entity as WarehouseItemEntity},
};
use bloomstock::{events, InventoryEngine};

pub struct TestEngine {
    pub engine: InventoryEngine,
    pub db: Arc<DbPool>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestEngine {
    /// Fresh engine over a private in-memory database. A single pooled
    /// connection keeps every query on the same SQLite instance.
    pub async fn new() -> Self {
        let config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations failed");

        let db = Arc::new(pool);
        let (sender, receiver) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(receiver));
        let engine = InventoryEngine::new(db.clone(), sender);

        Self {
            engine,
            db,
            _event_task: event_task,
        }
    }

    pub async fn seed_item(&self, name: &str, quantity: i32) -> i64 {
        self.seed_item_full(name, quantity, 0, dec!(1.00)).await
    }

    pub async fn seed_item_full(
        &self,
        name: &str,
        quantity: i32,
        min_quantity: i32,
        cost_price: Decimal,
    ) -> i64 {
        let item = warehouse_item::ActiveModel {
            name: Set(name.to_string()),
            quantity: Set(quantity),
            min_quantity: Set(min_quantity),
            cost_price: Set(cost_price),
            retail_price: Set(cost_price * dec!(2)),
            version: Set(1),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        item.insert(&*self.db).await.expect("seed item").id
    }

    pub async fn seed_product(&self, name: &str, is_enabled: bool) -> i64 {
        let prod = product::ActiveModel {
            name: Set(name.to_string()),
            is_enabled: Set(is_enabled),
            price: Set(dec!(25.00)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        prod.insert(&*self.db).await.expect("seed product").id
    }

    pub async fn seed_recipe_line(
        &self,
        product_id: i64,
        warehouse_item_id: i64,
        quantity_per_unit: i32,
        is_optional: bool,
    ) {
        let line = product_recipe::ActiveModel {
            product_id: Set(product_id),
            warehouse_item_id: Set(warehouse_item_id),
            quantity_per_unit: Set(quantity_per_unit),
            is_optional: Set(is_optional),
            is_deleted: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        line.insert(&*self.db).await.expect("seed recipe line");
    }

    pub async fn seed_order(&self, order_number: &str, status: OrderStatus) -> Uuid {
        self.seed_order_aged(order_number, status, 0).await
    }

    /// Seeds an order created `age_hours` in the past, for sweep tests.
    pub async fn seed_order_aged(
        &self,
        order_number: &str,
        status: OrderStatus,
        age_hours: i64,
    ) -> Uuid {
        let order_row = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(order_number.to_string()),
            status: Set(status.as_str().to_string()),
            created_at: Set(Utc::now() - Duration::hours(age_hours)),
            ..Default::default()
        };
        order_row.insert(&*self.db).await.expect("seed order").id
    }

    pub async fn seed_order_item(&self, order_id: Uuid, product_id: i64, quantity: i32) {
        let line = order_item::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            unit_price: Set(dec!(25.00)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        line.insert(&*self.db).await.expect("seed order item");
    }

    /// Reloads an item's current on-hand quantity.
    pub async fn item_quantity(&self, warehouse_item_id: i64) -> i32 {
        WarehouseItemEntity::find_by_id(warehouse_item_id)
            .one(&*self.db)
            .await
            .expect("load item")
            .expect("item exists")
            .quantity
    }
}
