use actix_web::{http::StatusCode, test, test::TestRequest, App};
use serde_json::{json, Value};
use shopkeep_engine::{helpers::calculate_hmac, traits::GatewayPaymentStatus};

use super::helpers::{checkout, send, start_payment, str_at, test_shop, WEBHOOK_SECRET};
use crate::config::SHIPPER_SIGNATURE_HEADER;

fn webhook(body: &Value) -> TestRequest {
    let payload = body.to_string();
    let signature = calculate_hmac(WEBHOOK_SECRET, payload.as_bytes());
    TestRequest::post()
        .uri("/shipping/webhook")
        .insert_header((SHIPPER_SIGNATURE_HEADER, signature))
        .set_payload(payload)
}

#[actix_web::test]
async fn delivery_updates_complete_the_order() {
    let shop = test_shop().await;
    let product = shop.product("SONGKET-01", 400_000, 2).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let body = checkout(&app, &product, 1).await;
    let order_number = str_at(&body, "/order/order_number").to_string();
    let merchant_ref = start_payment(&app, str_at(&body, "/invoices/0/invoice_number")).await;
    shop.gateway.set_status(&merchant_ref, GatewayPaymentStatus::Paid, None);
    let req = TestRequest::post().uri(&format!("/api/orders/{order_number}/check_status")).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_at(&body, "/0/invoice_status"), "paid");

    let req = TestRequest::post()
        .uri(&format!("/api/admin/orders/{order_number}/book_shipment"))
        .set_json(json!({ "courier": "jne" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let shipment_id = str_at(&body, "/shipment_id").to_string();
    assert_eq!(shop.shipper.booked().len(), 1);
    assert_eq!(shop.shipper.booked()[0].order_number, order_number);

    let update = json!({ "order_id": shipment_id, "status": "picked" });
    let (status, body) = send(&app, webhook(&update).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let req = TestRequest::get().uri(&format!("/api/admin/orders/{order_number}")).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(str_at(&body, "/order/status"), "shipped");

    let update = json!({ "order_id": shipment_id, "status": "delivered", "courier_waybill_id": "TRK00000001" });
    let (status, body) = send(&app, webhook(&update).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let req = TestRequest::get().uri(&format!("/api/admin/orders/{order_number}")).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(str_at(&body, "/order/status"), "completed");
}

#[actix_web::test]
async fn webhooks_are_always_acknowledged() {
    let shop = test_shop().await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;

    let unknown = json!({ "order_id": "SHP-9999", "status": "delivered" });
    let (status, body) = send(&app, webhook(&unknown).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let unmapped = json!({ "order_id": "SHP-9999", "status": "allocated" });
    let (status, body) = send(&app, webhook(&unmapped).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Status ignored.");

    let (status, body) = send(&app, webhook(&json!({ "status": "delivered" })).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn unsigned_webhooks_are_forbidden() {
    let shop = test_shop().await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let req = TestRequest::post()
        .uri("/shipping/webhook")
        .set_payload(json!({ "order_id": "SHP-0001", "status": "delivered" }).to_string())
        .to_request();
    let err = test::try_call_service(&app, req).await.expect_err("Unsigned webhook was accepted");
    assert_eq!(err.error_response().status(), StatusCode::FORBIDDEN);
}
