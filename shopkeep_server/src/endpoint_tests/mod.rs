use actix_web::{http::StatusCode, test, App};

mod helpers;
mod orders;
mod payments;
mod shipping;

#[actix_web::test]
async fn health_check() {
    let app = test::init_service(App::new().service(crate::routes::health)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = test::read_body(res).await;
    assert_eq!(body, "👍️\n");
}
