mod common;

use axum::http::{Method, StatusCode};
use common::{cart_payload, TestApp};
use pix_checkout::models::OrderStatus;
use rstest::rstest;
use serde_json::json;

async fn app_with_pending_order() -> (TestApp, String) {
    let app = TestApp::new().await;
    let res = app.post_json("/api/checkout/pix", cart_payload()).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let id = res.body["transactionId"].as_str().unwrap().to_string();
    (app, id)
}

#[tokio::test]
async fn lxpay_paid_webhook_marks_order_paid() {
    let (app, id) = app_with_pending_order().await;

    let res = app
        .post_json("/api/webhooks/lxpay", json!({"transactionId": id, "status": "PAID"}))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.body,
        json!({"success": true, "message": "Webhook processed", "transactionId": id, "status": "paid"})
    );

    let order = app.order(&id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.amount_cents, 5180);
    assert_eq!(order.customer_name.as_deref(), Some("Maria Souza"));
    assert!(order.updated_at >= order.created_at);
}

#[rstest]
#[case("approved", "paid")]
#[case("Canceled", "cancelled")]
#[case("EXPIRED", "expired")]
#[case("refused", "failed")]
#[case("waiting_payment", "pending")]
#[case("SOMETHING_NEW", "pending")]
#[tokio::test]
async fn abyssalpay_postback_maps_status(#[case] raw: &str, #[case] expected: &str) {
    let app = TestApp::new().await;

    let res = app
        .post_json(
            "/api/webhooks/abyssalpay",
            json!({"idTransaction": "aby-77", "status": raw, "amount": 51.8}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], expected);
    assert_eq!(res.body["transactionId"], "aby-77");
}

#[tokio::test]
async fn unknown_transaction_gets_a_basic_row() {
    let app = TestApp::new().await;

    let res = app
        .post_json(
            "/api/webhooks/lxpay",
            json!({"transaction_id": "lx-unknown", "status": "paid", "amount": "25.90"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let order = app.order("lx-unknown").await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.amount_cents, 2590);
    assert!(order.customer_name.is_none());

    let res = app
        .post_json("/api/webhooks/lxpay", json!({"transactionId": "lx-no-amount"}))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "pending");
    assert_eq!(app.order("lx-no-amount").await.unwrap().amount_cents, 0);
}

#[tokio::test]
async fn repeated_webhook_is_idempotent() {
    let (app, id) = app_with_pending_order().await;
    let payload = json!({"transactionId": id, "status": "paid"});

    let first = app.post_json("/api/webhooks/lxpay", payload.clone()).await;
    let after_first = app.order(&id).await.unwrap();
    let second = app.post_json("/api/webhooks/lxpay", payload).await;
    let after_second = app.order(&id).await.unwrap();

    assert_eq!(first.body, second.body);
    assert_eq!(after_first.status, after_second.status);
    assert_eq!(after_first.amount_cents, after_second.amount_cents);
    assert_eq!(after_first.created_at, after_second.created_at);
}

#[tokio::test]
async fn last_webhook_write_wins() {
    let (app, id) = app_with_pending_order().await;

    app.post_json("/api/webhooks/lxpay", json!({"transactionId": id, "status": "paid"}))
        .await;
    app.post_json("/api/webhooks/lxpay", json!({"transactionId": id, "status": "cancelled"}))
        .await;

    assert_eq!(app.order(&id).await.unwrap().status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn webhook_without_transaction_id_is_rejected() {
    let app = TestApp::new().await;

    let res = app
        .post_json("/api/webhooks/lxpay", json!({"status": "paid"}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["success"], false);

    let res = app
        .post_json("/api/webhooks/abyssalpay", json!({"idTransaction": " ' ; ", "status": "paid"}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreadable_webhook_body_is_rejected() {
    let app = TestApp::new().await;
    let res = app.request(Method::POST, "/api/webhooks/lxpay", None, &[]).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["success"], false);
}

#[tokio::test]
async fn webhook_before_insert_keeps_status() {
    let app = TestApp::new().await;

    // The stub's first charge id is known in advance.
    app.post_json("/api/webhooks/lxpay", json!({"transactionId": "tx-stub-1", "status": "paid"}))
        .await;
    let res = app.post_json("/api/checkout/pix", cart_payload()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "paid");

    let order = app.order("tx-stub-1").await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.amount_cents, 5180);
    assert_eq!(order.customer_name.as_deref(), Some("Maria Souza"));
}

#[tokio::test]
async fn gateway_ids_with_underscores_and_dots_round_trip() {
    let app = TestApp::new().await;
    app.gateway.queue_charge_id("tx_1.a");

    let res = app.post_json("/api/checkout/pix", cart_payload()).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["transactionId"], "tx_1.a");

    let res = app
        .post_json("/api/webhooks/lxpay", json!({"transactionId": "tx_1.a", "status": "PAID"}))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["transactionId"], "tx_1.a");

    let order = app.order("tx_1.a").await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(app.order("tx1a").await.is_none());

    let res = app.get("/api/checkout/status?id=tx_1.a").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "paid");
    assert_eq!(res.body["source"], "database");
    assert_eq!(res.body["valor"], 5180);
}

#[tokio::test]
async fn overflowing_amount_counts_as_zero() {
    let app = TestApp::new().await;

    let res = app
        .post_json(
            "/api/webhooks/lxpay",
            json!({"transactionId": "lx-huge", "status": "paid", "amount": "79228162514264337593543950335"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(app.order("lx-huge").await.unwrap().amount_cents, 0);
}

#[tokio::test]
async fn concurrent_paid_deliveries_report_one_transition() {
    let (app, id) = app_with_pending_order().await;
    let orders = &app.state.services.orders;

    let (first, second) = tokio::join!(
        orders.apply_gateway_status(&id, Some("PAID"), None),
        orders.apply_gateway_status(&id, Some("approved"), None),
    );
    let transitions = [first.unwrap(), second.unwrap()]
        .iter()
        .filter(|update| update.became_paid)
        .count();
    assert_eq!(transitions, 1);

    let again = orders
        .apply_gateway_status(&id, Some("paid"), None)
        .await
        .unwrap();
    assert!(!again.became_paid);
    assert_eq!(again.order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn paid_webhook_for_unknown_id_reports_transition() {
    let app = TestApp::new().await;
    let orders = &app.state.services.orders;

    let update = orders
        .apply_gateway_status("lx-new", Some("paid"), None)
        .await
        .unwrap();
    assert!(update.became_paid);
    assert!(update.previous.is_none());
}
