use actix_web::{http::StatusCode, test, test::TestRequest, App};
use serde_json::json;
use shopkeep_engine::traits::GatewayPaymentStatus;

use super::helpers::{checkout, send, start_payment, str_at, test_shop};

#[actix_web::test]
async fn checkout_reserves_stock_and_opens_an_invoice() {
    let shop = test_shop().await;
    let product = shop.product("BATIK-01", 150_000, 5).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let body = checkout(&app, &product, 2).await;
    assert_eq!(str_at(&body, "/order/status"), "pending");
    assert_eq!(str_at(&body, "/order/payment_status"), "unpaid");
    assert_eq!(body["order"]["total"], 300_000);
    let invoices = body["invoices"].as_array().expect("no invoices");
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["amount"], 300_000);
    assert_eq!(invoices[0]["status"], "unpaid");
}

#[actix_web::test]
async fn sold_out_products_are_a_conflict() {
    let shop = test_shop().await;
    let product = shop.product("BATIK-02", 150_000, 1).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let order = shopkeep_engine::test_utils::fixtures::order_for(Some("sari"), product.id, 2);
    let req = TestRequest::post().uri("/api/checkout").set_json(order).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().is_some());
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    let shop = test_shop().await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let req = TestRequest::get().uri("/api/orders/ORD-19700101-000000").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fetching_an_order_picks_up_missed_payments() {
    let shop = test_shop().await;
    let product = shop.product("BATIK-03", 150_000, 5).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let body = checkout(&app, &product, 1).await;
    let order_number = str_at(&body, "/order/order_number").to_string();
    let merchant_ref = start_payment(&app, str_at(&body, "/invoices/0/invoice_number")).await;
    // The customer paid, but the notification never arrived
    shop.gateway.set_status(&merchant_ref, GatewayPaymentStatus::Paid, None);

    let req = TestRequest::get().uri(&format!("/api/orders/{order_number}")).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_at(&body, "/order/status"), "processing");
    assert_eq!(str_at(&body, "/order/payment_status"), "paid");
    assert_eq!(str_at(&body, "/invoices/0/status"), "paid");
}

#[actix_web::test]
async fn gateway_outages_do_not_fail_order_lookups() {
    let shop = test_shop().await;
    let product = shop.product("BATIK-04", 150_000, 5).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let body = checkout(&app, &product, 1).await;
    let order_number = str_at(&body, "/order/order_number").to_string();
    start_payment(&app, str_at(&body, "/invoices/0/invoice_number")).await;
    shop.gateway.set_offline(true);

    let req = TestRequest::get().uri(&format!("/api/orders/{order_number}")).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_at(&body, "/order/status"), "pending");
}

#[actix_web::test]
async fn admin_cancels_an_unpaid_order() {
    let shop = test_shop().await;
    let product = shop.product("BATIK-05", 150_000, 5).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let body = checkout(&app, &product, 2).await;
    let order_number = str_at(&body, "/order/order_number").to_string();

    let req = TestRequest::post()
        .uri(&format!("/api/admin/orders/{order_number}/cancel"))
        .set_json(json!({ "reason": "Customer changed their mind", "actor": "dewi" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(str_at(&body, "/order/status"), "cancelled");
    assert_eq!(body["refunded"], 0);

    let req = TestRequest::get().uri(&format!("/api/admin/orders/{order_number}")).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_at(&body, "/invoices/0/status"), "cancelled");
    assert!(body["logs"].as_array().map(|l| !l.is_empty()).unwrap_or(false));

    // Cancelling twice is refused
    let req = TestRequest::post()
        .uri(&format!("/api/admin/orders/{order_number}/cancel"))
        .set_json(json!({ "reason": "again" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn admin_searches_orders_by_customer() {
    let shop = test_shop().await;
    let product = shop.product("BATIK-06", 75_000, 10).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    checkout(&app, &product, 1).await;
    checkout(&app, &product, 3).await;

    let req = TestRequest::post().uri("/api/admin/orders/search").set_json(json!({ "user_id": "sari" })).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let req = TestRequest::post().uri("/api/admin/orders/search").set_json(json!({ "user_id": "budi" })).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn settings_can_be_read_and_changed() {
    let shop = test_shop().await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let req = TestRequest::post().uri("/api/admin/settings/preorder_deposit_percent").set_payload("40").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["value"], "40");

    let req = TestRequest::get().uri("/api/admin/settings").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let deposit = body
        .as_array()
        .and_then(|s| s.iter().find(|s| s["key"] == "preorder_deposit_percent"))
        .expect("preorder_deposit_percent is missing");
    assert_eq!(deposit["value"], "40");
}
