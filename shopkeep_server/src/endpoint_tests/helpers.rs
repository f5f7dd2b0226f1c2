use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
};
use serde_json::Value;
use shopkeep_common::Secret;
use shopkeep_engine::{
    db_types::Product,
    events::EventProducers,
    test_utils::{
        fixtures::{order_for, stocked_product},
        mocks::{MockGateway, MockShipper},
        prepare_env::{prepare_test_env, random_db_path},
    },
    SettingsApi,
    SqliteDatabase,
};

use crate::server::ShopApis;

// Test keys only. DO NOT re-use these anywhere.
pub const GATEWAY_KEY: &str = "gateway-test-signing-key";
pub const WEBHOOK_SECRET: &str = "shipper-test-webhook-secret";

pub type TestApis = ShopApis<SqliteDatabase, MockShipper, MockGateway>;

/// A fresh database behind the full set of routes, with mocks standing in for the gateway and the shipping provider.
pub struct TestShop {
    pub db: SqliteDatabase,
    pub gateway: MockGateway,
    pub shipper: MockShipper,
    pub apis: TestApis,
}

pub async fn test_shop() -> TestShop {
    let db = prepare_test_env(&random_db_path()).await;
    let gateway = MockGateway::new();
    let shipper = MockShipper::new();
    let settings = Arc::new(SettingsApi::new(db.clone()));
    let signing_key = Secret::new(GATEWAY_KEY.to_string());
    let apis =
        ShopApis::new(db.clone(), gateway.clone(), shipper.clone(), EventProducers::default(), settings, signing_key)
            .with_webhook_auth(Secret::new(WEBHOOK_SECRET.to_string()), true);
    TestShop { db, gateway, shipper, apis }
}

impl TestShop {
    pub async fn product(&self, sku: &str, price: i64, stock: i64) -> Product {
        stocked_product(&self.db, sku, price, stock).await
    }
}

/// Sends the request and returns the status along with the body parsed as JSON (`Null` if it isn't JSON).
pub async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::call_service(app, req).await;
    let status = res.status();
    let body = test::read_body(res).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Places a storefront order for `quantity` units of `product` and returns the response body.
pub async fn checkout<S, B>(app: &S, product: &Product, quantity: i64) -> Value
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let order = order_for(Some("sari"), product.id, quantity);
    let req = test::TestRequest::post().uri("/api/checkout").set_json(order).to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "checkout failed: {body}");
    body
}

/// Starts a gateway payment for the invoice and returns the merchant reference of the attempt.
pub async fn start_payment<S, B>(app: &S, invoice_number: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri(&format!("/api/invoices/{invoice_number}/pay"))
        .set_json(serde_json::json!({ "method": "bca_va" }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK, "payment failed to start: {body}");
    body["attempt"]["merchant_ref"].as_str().expect("no merchant_ref in payment session").to_string()
}

pub fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or_else(|| panic!("no string at {pointer} in {value}"))
}
