use actix_web::{http::StatusCode, test, test::TestRequest, App};
use serde_json::json;
use shopkeep_engine::{helpers::calculate_hmac, traits::GatewayPaymentStatus};

use super::helpers::{checkout, send, start_payment, str_at, test_shop, GATEWAY_KEY};
use crate::config::GATEWAY_SIGNATURE_HEADER;

fn paid_notification(merchant_ref: &str, amount: i64) -> String {
    json!({
        "merchant_ref": merchant_ref,
        "gateway_ref": format!("GW-{merchant_ref}"),
        "status": "paid",
        "amount": amount,
        "method": "bca_va"
    })
    .to_string()
}

#[actix_web::test]
async fn signed_notifications_settle_the_invoice_once() {
    let shop = test_shop().await;
    let product = shop.product("KEBAYA-01", 250_000, 3).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let body = checkout(&app, &product, 1).await;
    let invoice_number = str_at(&body, "/invoices/0/invoice_number").to_string();
    let merchant_ref = start_payment(&app, &invoice_number).await;

    let notification = paid_notification(&merchant_ref, 250_000);
    let signature = calculate_hmac(GATEWAY_KEY, notification.as_bytes());
    let req = TestRequest::post()
        .uri("/gateway/notify")
        .insert_header((GATEWAY_SIGNATURE_HEADER, signature.clone()))
        .set_payload(notification.clone())
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["invoice_number"], invoice_number.as_str());
    assert_eq!(body["invoice_status"], "paid");
    assert_eq!(str_at(&body, "/outcome/outcome"), "finalized");

    // Gateways retry. The second delivery changes nothing.
    let req = TestRequest::post()
        .uri("/gateway/notify")
        .insert_header((GATEWAY_SIGNATURE_HEADER, signature))
        .set_payload(notification)
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_at(&body, "/outcome/outcome"), "already_processed");

    let req = TestRequest::get().uri("/api/admin/ledger/trial_balance").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_debit"], body["total_credit"]);
}

#[actix_web::test]
async fn notifications_with_bad_signatures_are_rejected() {
    let shop = test_shop().await;
    let product = shop.product("KEBAYA-02", 250_000, 3).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let body = checkout(&app, &product, 1).await;
    let invoice_number = str_at(&body, "/invoices/0/invoice_number").to_string();
    let merchant_ref = start_payment(&app, &invoice_number).await;

    let notification = paid_notification(&merchant_ref, 250_000);
    let signature = calculate_hmac("not-the-key", notification.as_bytes());
    let req = TestRequest::post()
        .uri("/gateway/notify")
        .insert_header((GATEWAY_SIGNATURE_HEADER, signature))
        .set_payload(notification.clone())
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::post().uri("/gateway/notify").set_payload(notification).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::get().uri(&format!("/api/invoices/{invoice_number}")).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_at(&body, "/invoice/status"), "unpaid");
}

#[actix_web::test]
async fn returning_customers_trigger_a_status_inquiry() {
    let shop = test_shop().await;
    let product = shop.product("KEBAYA-03", 250_000, 3).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let body = checkout(&app, &product, 1).await;
    let merchant_ref = start_payment(&app, str_at(&body, "/invoices/0/invoice_number")).await;

    let req = TestRequest::get().uri(&format!("/gateway/return?order_id={merchant_ref}")).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_at(&body, "/outcome/outcome"), "pending");
    assert_eq!(body["invoice_status"], "unpaid");

    shop.gateway.set_status(&merchant_ref, GatewayPaymentStatus::Paid, None);
    let req = TestRequest::get().uri(&format!("/gateway/return?order_id={merchant_ref}")).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(str_at(&body, "/outcome/outcome"), "finalized");
    assert_eq!(body["invoice_status"], "paid");

    // The gateway has never heard of this one
    let req = TestRequest::get().uri("/gateway/return?order_id=M-UNKNOWN").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn wallet_top_ups_pay_for_orders() {
    let shop = test_shop().await;
    let product = shop.product("KEBAYA-04", 150_000, 5).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;

    let req = TestRequest::post()
        .uri("/api/wallet/topup")
        .set_json(json!({ "user_id": "sari", "amount": 500_000 }))
        .to_request();
    let (status, topup) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{topup}");
    let merchant_ref = start_payment(&app, str_at(&topup, "/invoice_number")).await;
    shop.gateway.set_status(&merchant_ref, GatewayPaymentStatus::Paid, None);
    let req = TestRequest::get().uri(&format!("/gateway/return?order_id={merchant_ref}")).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::get().uri("/api/wallet/sari").to_request();
    let (_, wallet) = send(&app, req).await;
    assert_eq!(wallet["balance"], 500_000);

    let body = checkout(&app, &product, 2).await;
    let invoice_number = str_at(&body, "/invoices/0/invoice_number").to_string();
    let req = TestRequest::post()
        .uri(&format!("/api/invoices/{invoice_number}/pay_with_wallet"))
        .set_json(json!({ "user_id": "sari" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["invoice_status"], "paid");

    let req = TestRequest::get().uri("/api/wallet/sari").to_request();
    let (_, wallet) = send(&app, req).await;
    assert_eq!(wallet["balance"], 200_000);

    // Only the owner of the order can pay for it from their wallet
    let body = checkout(&app, &product, 2).await;
    let invoice_number = str_at(&body, "/invoices/0/invoice_number").to_string();
    let req = TestRequest::post()
        .uri(&format!("/api/invoices/{invoice_number}/pay_with_wallet"))
        .set_json(json!({ "user_id": "budi" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Not enough left for a second order
    let req = TestRequest::post()
        .uri(&format!("/api/invoices/{invoice_number}/pay_with_wallet"))
        .set_json(json!({ "user_id": "sari" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let req = TestRequest::get().uri("/api/wallet/sari").to_request();
    let (_, wallet) = send(&app, req).await;
    assert_eq!(wallet["balance"], 200_000);
}

#[actix_web::test]
async fn staff_confirm_manual_transfers() {
    let shop = test_shop().await;
    let product = shop.product("KEBAYA-05", 120_000, 3).await;
    let app = test::init_service(App::new().configure(|cfg| shop.apis.configure(cfg))).await;
    let body = checkout(&app, &product, 1).await;
    let invoice_number = str_at(&body, "/invoices/0/invoice_number").to_string();
    let order_number = str_at(&body, "/order/order_number").to_string();

    let req = TestRequest::post()
        .uri(&format!("/api/admin/invoices/{invoice_number}/confirm"))
        .set_json(json!({ "method": "bank_transfer", "actor": "dewi" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["invoice_status"], "paid");

    let req = TestRequest::get().uri(&format!("/api/orders/{order_number}")).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(str_at(&body, "/order/status"), "processing");
}
