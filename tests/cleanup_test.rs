mod common;

use bloomstock::entities::order::OrderStatus;
use bloomstock::{ItemRequest, ServiceError};
use common::TestEngine;

async fn reserve(t: &TestEngine, order_id: uuid::Uuid, product_id: i64, quantity: i32) {
    t.engine
        .create_reservation(
            order_id,
            &[ItemRequest {
                product_id,
                quantity,
            }],
            true,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn dry_run_reports_without_deleting() {
    let t = TestEngine::new().await;

    let rose = t.seed_item("Rose", 100).await;
    let lily = t.seed_item("Lily", 100).await;
    let bouquet = t.seed_product("Mixed bouquet", true).await;
    t.seed_recipe_line(bouquet, rose, 3, false).await;
    t.seed_recipe_line(bouquet, lily, 2, false).await;

    // Created 100 hours ago, never paid, holding 2 reservations.
    let stale = t.seed_order_aged("FL-5001", OrderStatus::New, 100).await;
    reserve(&t, stale, bouquet, 2).await;

    let stats = t
        .engine
        .cleanup_expired_reservations(72, true)
        .await
        .unwrap();
    assert_eq!(stats.orders_found, 1);
    assert_eq!(stats.reservations_found, 2);
    assert_eq!(stats.reservations_deleted, 0);
    assert!(stats.dry_run);

    let details = t.engine.reservations.get_reservations(stale).await.unwrap();
    assert_eq!(details.len(), 2);

    let stats = t
        .engine
        .cleanup_expired_reservations(72, false)
        .await
        .unwrap();
    assert_eq!(stats.reservations_deleted, 2);

    // The swept stock is fully free again.
    let result = t.engine.check_availability(bouquet, 33).await.unwrap();
    assert!(result.available);
    assert_eq!(result.max_quantity, 33); // 100 / 3
    assert!(result.ingredients.iter().all(|i| i.reserved == 0));
}

#[tokio::test]
async fn only_abandoned_states_past_the_threshold_are_swept() {
    let t = TestEngine::new().await;

    let rose = t.seed_item("Rose", 1000).await;
    let single = t.seed_product("Single rose", true).await;
    t.seed_recipe_line(single, rose, 1, false).await;

    let stale_new = t.seed_order_aged("FL-5002", OrderStatus::New, 100).await;
    let stale_cancelled = t
        .seed_order_aged("FL-5003", OrderStatus::Cancelled, 100)
        .await;
    let stale_paid = t.seed_order_aged("FL-5004", OrderStatus::Paid, 100).await;
    let fresh_new = t.seed_order("FL-5005", OrderStatus::New).await;

    for &order_id in &[stale_new, stale_cancelled, stale_paid, fresh_new] {
        reserve(&t, order_id, single, 1).await;
    }

    let stats = t
        .engine
        .cleanup_expired_reservations(72, false)
        .await
        .unwrap();
    assert_eq!(stats.orders_found, 2);
    assert_eq!(stats.reservations_deleted, 2);

    // Legitimately in-flight and recent holds survive.
    assert_eq!(
        t.engine.reservations.get_reservations(stale_paid).await.unwrap().len(),
        1
    );
    assert_eq!(
        t.engine.reservations.get_reservations(fresh_new).await.unwrap().len(),
        1
    );
    assert!(t
        .engine
        .reservations
        .get_reservations(stale_new)
        .await
        .unwrap()
        .is_empty());
    assert!(t
        .engine
        .reservations
        .get_reservations(stale_cancelled)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn sweep_with_nothing_to_do_reports_zeros() {
    let t = TestEngine::new().await;

    let stats = t
        .engine
        .cleanup_expired_reservations(72, false)
        .await
        .unwrap();
    assert_eq!(stats.orders_found, 0);
    assert_eq!(stats.reservations_found, 0);
    assert_eq!(stats.reservations_deleted, 0);
}

#[tokio::test]
async fn non_positive_age_threshold_is_rejected() {
    let t = TestEngine::new().await;
    let err = t
        .engine
        .cleanup_expired_reservations(0, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}
