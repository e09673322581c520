mod common;

use bloomstock::entities::order::OrderStatus;
use bloomstock::entities::warehouse_item::{self, Entity as WarehouseItemEntity};
use bloomstock::entities::warehouse_operation::OperationType;
use bloomstock::{ItemRequest, ServiceError};
use common::TestEngine;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

/// Adjusts on-hand stock directly, simulating an out-of-band change made
/// outside the engine (manual correction, breakage writeoff).
async fn set_stock_out_of_band(t: &TestEngine, warehouse_item_id: i64, quantity: i32) {
    let item = WarehouseItemEntity::find_by_id(warehouse_item_id)
        .one(&*t.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: warehouse_item::ActiveModel = item.into();
    active.quantity = Set(quantity);
    active.update(&*t.db).await.unwrap();
}

#[tokio::test]
async fn conversion_deducts_stock_and_writes_audit_rows() {
    let t = TestEngine::new().await;

    let rose = t.seed_item("Rose", 100).await;
    let lily = t.seed_item("Lily", 40).await;
    let bouquet = t.seed_product("Mixed bouquet", true).await;
    t.seed_recipe_line(bouquet, rose, 3, false).await;
    t.seed_recipe_line(bouquet, lily, 2, false).await;

    let order_id = t.seed_order("FL-4001", OrderStatus::Paid).await;
    t.engine
        .create_reservation(
            order_id,
            &[ItemRequest {
                product_id: bouquet,
                quantity: 4,
            }],
            true,
        )
        .await
        .unwrap();

    let operations = t
        .engine
        .convert_reservations_to_deductions(order_id)
        .await
        .unwrap();

    assert_eq!(operations.len(), 2);
    assert_eq!(t.item_quantity(rose).await, 88);
    assert_eq!(t.item_quantity(lily).await, 32);

    let rose_op = operations
        .iter()
        .find(|op| op.warehouse_item_id == rose)
        .unwrap();
    assert_eq!(rose_op.operation_type, OperationType::Sale.as_str());
    assert_eq!(rose_op.quantity_change, -12);
    assert_eq!(rose_op.balance_after, 88);
    assert_eq!(rose_op.order_id, Some(order_id));
    assert!(rose_op.description.contains("FL-4001"));

    // The holds became permanent facts and are gone.
    let details = t.engine.reservations.get_reservations(order_id).await.unwrap();
    assert!(details.is_empty());

    // The audit trail is queryable per item, newest first.
    let trail = t.engine.reports.list_operations(rose, 10).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].quantity_change, -12);
}

#[tokio::test]
async fn conversion_aborts_whole_order_on_any_shortfall() {
    let t = TestEngine::new().await;

    let rose = t.seed_item("Rose", 100).await;
    let lily = t.seed_item("Lily", 40).await;
    let bouquet = t.seed_product("Mixed bouquet", true).await;
    t.seed_recipe_line(bouquet, rose, 3, false).await;
    t.seed_recipe_line(bouquet, lily, 2, false).await;

    let order_id = t.seed_order("FL-4002", OrderStatus::Paid).await;
    t.engine
        .create_reservation(
            order_id,
            &[ItemRequest {
                product_id: bouquet,
                quantity: 4,
            }],
            true,
        )
        .await
        .unwrap();

    // Stock for lilies vanished out-of-band since the hold was taken.
    set_stock_out_of_band(&t, lily, 5).await;

    let err = t
        .engine
        .convert_reservations_to_deductions(order_id)
        .await
        .unwrap_err();
    assert!(err.is_insufficient_stock());

    // Nothing was deducted anywhere and every reservation survived.
    assert_eq!(t.item_quantity(rose).await, 100);
    assert_eq!(t.item_quantity(lily).await, 5);
    let details = t.engine.reservations.get_reservations(order_id).await.unwrap();
    assert_eq!(details.len(), 2);
    let trail = t.engine.reports.list_operations(rose, 10).await.unwrap();
    assert!(trail.is_empty());
}

#[tokio::test]
async fn legacy_orders_without_reservations_deduct_from_order_items() {
    let t = TestEngine::new().await;

    let rose = t.seed_item("Rose", 50).await;
    let bouquet = t.seed_product("Rose bouquet", true).await;
    t.seed_recipe_line(bouquet, rose, 6, false).await;

    // Order predates the reservation ledger: line items only.
    let order_id = t.seed_order("FL-4003", OrderStatus::Paid).await;
    t.seed_order_item(order_id, bouquet, 3).await;

    let operations = t
        .engine
        .convert_reservations_to_deductions(order_id)
        .await
        .unwrap();

    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].quantity_change, -18);
    assert_eq!(t.item_quantity(rose).await, 32);
}

#[tokio::test]
async fn legacy_fallback_still_aborts_atomically() {
    let t = TestEngine::new().await;

    let rose = t.seed_item("Rose", 50).await;
    let orchid = t.seed_item("Orchid", 2).await;
    let grand = t.seed_product("Grand arrangement", true).await;
    t.seed_recipe_line(grand, rose, 4, false).await;
    t.seed_recipe_line(grand, orchid, 5, false).await;

    let order_id = t.seed_order("FL-4004", OrderStatus::Paid).await;
    t.seed_order_item(order_id, grand, 1).await;

    let err = t
        .engine
        .convert_reservations_to_deductions(order_id)
        .await
        .unwrap_err();
    assert!(err.is_insufficient_stock());
    assert_eq!(t.item_quantity(rose).await, 50);
    assert_eq!(t.item_quantity(orchid).await, 2);
}

#[tokio::test]
async fn unknown_order_fails_with_not_found() {
    let t = TestEngine::new().await;
    let err = t
        .engine
        .convert_reservations_to_deductions(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn order_with_nothing_to_deduct_is_a_no_op() {
    let t = TestEngine::new().await;

    let order_id = t.seed_order("FL-4005", OrderStatus::Paid).await;
    let operations = t
        .engine
        .convert_reservations_to_deductions(order_id)
        .await
        .unwrap();
    assert!(operations.is_empty());
}

#[tokio::test]
async fn optional_lines_are_not_deducted_on_the_legacy_path() {
    let t = TestEngine::new().await;

    let rose = t.seed_item("Rose", 20).await;
    let ribbon = t.seed_item("Ribbon", 20).await;
    let bouquet = t.seed_product("Wrapped bouquet", true).await;
    t.seed_recipe_line(bouquet, rose, 2, false).await;
    t.seed_recipe_line(bouquet, ribbon, 1, true).await;

    let order_id = t.seed_order("FL-4006", OrderStatus::Paid).await;
    t.seed_order_item(order_id, bouquet, 5).await;

    let operations = t
        .engine
        .convert_reservations_to_deductions(order_id)
        .await
        .unwrap();

    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].warehouse_item_id, rose);
    assert_eq!(t.item_quantity(ribbon).await, 20);
}

#[tokio::test]
async fn on_hand_stock_never_goes_negative() {
    let t = TestEngine::new().await;

    let rose = t.seed_item("Rose", 12).await;
    let bouquet = t.seed_product("Dozen roses", true).await;
    t.seed_recipe_line(bouquet, rose, 12, false).await;

    let order_id = t.seed_order("FL-4007", OrderStatus::Paid).await;
    t.engine
        .create_reservation(
            order_id,
            &[ItemRequest {
                product_id: bouquet,
                quantity: 1,
            }],
            true,
        )
        .await
        .unwrap();

    t.engine
        .convert_reservations_to_deductions(order_id)
        .await
        .unwrap();
    assert_eq!(t.item_quantity(rose).await, 0);

    // A second conversion finds no reservations and no order items; nothing
    // further is deducted.
    let operations = t
        .engine
        .convert_reservations_to_deductions(order_id)
        .await
        .unwrap();
    assert!(operations.is_empty());
    assert_eq!(t.item_quantity(rose).await, 0);
}
