//! Request handler definitions
//!
//! Define each route and its handler here. Handlers are thin: they parse the request, call one engine API and turn
//! the result into a response. Anything longer belongs in the engine.
//!
//! Every handler is async. Database and gateway calls are futures, so a slow gateway never ties up a worker thread:
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use gateway_tools::ShipmentWebhook;
use log::*;
use serde_json::json;
use shopkeep_engine::{
    db_types::{InvoiceNumber, NewOrder, OrderNumber},
    order_objects::OrderQueryFilter,
    traits::{ShipmentDetails, ShipmentStatus},
    CatalogManagement,
    ExpiryManagement,
    InvoiceApi,
    InvoiceManagement,
    LedgerApi,
    LedgerManagement,
    OrderFlowApi,
    OrderManagement,
    PaymentGateway,
    Reconciliation,
    ReconciliationApi,
    SettingsApi,
    SettingsStore,
    ShippingProvider,
    SweepApi,
    WalletApi,
    WalletManagement,
};

use crate::{
    config::GATEWAY_SIGNATURE_HEADER,
    data_objects::{
        ActorParams,
        ArriveParams,
        BookShipmentParams,
        CancelParams,
        ConfirmPaymentParams,
        JsonResponse,
        NoteParams,
        PayParams,
        PaymentResult,
        PosRequest,
        RefundParams,
        ReturnParams,
        ShipParams,
        TopupParams,
        WalletPayParams,
    },
    errors::ServerError,
};

/// Everything the routes need from a storage backend.
pub trait ShopBackend:
    OrderManagement
    + InvoiceManagement
    + CatalogManagement
    + SettingsStore
    + Reconciliation
    + WalletManagement
    + LedgerManagement
    + ExpiryManagement
{
}

impl<T> ShopBackend for T where T: OrderManagement
        + InvoiceManagement
        + CatalogManagement
        + SettingsStore
        + Reconciliation
        + WalletManagement
        + LedgerManagement
        + ExpiryManagement
{
}

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl ShopBackend, ShippingProvider);
/// Creates an order from a storefront checkout. Stock is reserved and the invoice(s) opened in one go. Prices are
/// always taken from the catalog; the request only names products and quantities.
pub async fn checkout<B, S>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let order = body.into_inner();
    debug!("💻️ POST checkout for {} line(s)", order.items.len());
    let result = api.checkout(order).await?;
    info!("💻️ Order {} created", result.order.order_number);
    Ok(HttpResponse::Created().json(result))
}

route!(point_of_sale => Post "/pos" impl ShopBackend, ShippingProvider);
/// An in-store sale. The order is paid in cash and completed on the spot.
pub async fn point_of_sale<B, S>(
    body: web::Json<PosRequest>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let PosRequest { order, cashier } = body.into_inner();
    debug!("💻️ POST point of sale by {cashier}");
    let result = api.point_of_sale(order, &cashier).await?;
    Ok(HttpResponse::Created().json(result))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_number => Get "/orders/{number}" impl ShopBackend, ShippingProvider, PaymentGateway);
/// The customer's view of an order. While money is still owed, pending payment attempts are checked with the gateway
/// first, so a customer who paid but whose notification went missing sees the right status. A gateway outage does
/// not fail the request.
pub async fn order_by_number<B, S, G>(
    path: web::Path<OrderNumber>,
    orders: web::Data<OrderFlowApi<B, S>>,
    payments: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
    G: PaymentGateway,
{
    let number = path.into_inner();
    debug!("💻️ GET order {number}");
    let order = orders.fetch_order(&number).await?;
    if !order.status.is_terminal() && !order.is_fully_paid() {
        let outcomes = payments.refresh_order(&order).await;
        let settled = outcomes.iter().filter(|o| o.is_new_settlement()).count();
        if settled > 0 {
            info!("💻️ {settled} payment(s) for {number} were picked up while fetching the order");
        }
    }
    let detail = orders.order_detail(&number).await?.customer_view();
    Ok(HttpResponse::Ok().json(detail))
}

route!(check_order_status => Post "/orders/{number}/check_status" impl ShopBackend, PaymentGateway);
pub async fn check_order_status<B, G>(
    path: web::Path<OrderNumber>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    G: PaymentGateway,
{
    let number = path.into_inner();
    debug!("💻️ POST check_status for {number}");
    let outcomes = api.check_order_status(&number).await?;
    let results = outcomes.into_iter().map(PaymentResult::from).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(results))
}

//----------------------------------------------   Invoices  ----------------------------------------------------
route!(invoice_by_number => Get "/invoices/{number}" impl ShopBackend);
pub async fn invoice_by_number<B: ShopBackend>(
    path: web::Path<InvoiceNumber>,
    api: web::Data<InvoiceApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let number = path.into_inner();
    debug!("💻️ GET invoice {number}");
    let detail = api.invoice_detail(&number).await?;
    Ok(HttpResponse::Ok().json(detail))
}

route!(pay_invoice => Post "/invoices/{number}/pay" impl ShopBackend, PaymentGateway);
/// Starts a gateway payment. The response carries the merchant reference of the attempt and, for hosted payment
/// pages, where to send the customer.
pub async fn pay_invoice<B, G>(
    path: web::Path<InvoiceNumber>,
    body: web::Json<PayParams>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    G: PaymentGateway,
{
    let number = path.into_inner();
    let PayParams { method } = body.into_inner();
    debug!("💻️ POST pay {number} with {method}");
    let session = api.start_payment(&number, method).await?;
    Ok(HttpResponse::Ok().json(session))
}

route!(pay_with_wallet => Post "/invoices/{number}/pay_with_wallet" impl ShopBackend, PaymentGateway);
pub async fn pay_with_wallet<B, G>(
    path: web::Path<InvoiceNumber>,
    body: web::Json<WalletPayParams>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    G: PaymentGateway,
{
    let number = path.into_inner();
    let WalletPayParams { user_id } = body.into_inner();
    debug!("💻️ POST pay {number} from the wallet of {user_id}");
    let outcome = api.pay_with_wallet(&number, &user_id).await?;
    Ok(HttpResponse::Ok().json(PaymentResult::from(outcome)))
}

//----------------------------------------------   Wallets  ----------------------------------------------------
route!(wallet_topup => Post "/wallet/topup" impl ShopBackend);
/// Opens a top-up invoice. Pay it like any other invoice; the wallet is credited once it settles.
pub async fn wallet_topup<B: ShopBackend>(
    body: web::Json<TopupParams>,
    api: web::Data<InvoiceApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let TopupParams { user_id, amount } = body.into_inner();
    debug!("💻️ POST top-up of {amount} for {user_id}");
    let invoice = api.create_topup(&user_id, amount).await?;
    Ok(HttpResponse::Created().json(invoice))
}

route!(wallet => Get "/wallet/{user_id}" impl ShopBackend);
pub async fn wallet<B: ShopBackend>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET wallet for {user_id}");
    let balance = api.balance(&user_id).await?;
    let history = api.history(&user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "user_id": user_id, "balance": balance, "history": history })))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(admin_order => Get "/orders/{number}" impl ShopBackend, ShippingProvider);
/// The full order, staff notes included.
pub async fn admin_order<B, S>(
    path: web::Path<OrderNumber>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let detail = api.order_detail(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

route!(search_orders => Post "/orders/search" impl ShopBackend, ShippingProvider);
pub async fn search_orders<B, S>(
    body: web::Json<OrderQueryFilter>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let query = body.into_inner();
    debug!("💻️ POST order search {query:?}");
    let orders = api.search_orders(query).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(mark_arrived => Post "/orders/{number}/arrive" impl ShopBackend, ShippingProvider);
pub async fn mark_arrived<B, S>(
    path: web::Path<OrderNumber>,
    body: web::Json<ArriveParams>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let number = path.into_inner();
    let ArriveParams { details, actor } = body.into_inner();
    debug!("💻️ POST arrive for {number} by {actor}");
    let order = api.mark_arrived(&number, details, &actor).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(mark_product_arrived => Post "/products/{id}/arrive" impl ShopBackend, ShippingProvider);
/// Marks every pre-order waiting on the product as arrived.
pub async fn mark_product_arrived<B, S>(
    path: web::Path<i64>,
    body: web::Json<ArriveParams>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let product_id = path.into_inner();
    let ArriveParams { details, actor } = body.into_inner();
    debug!("💻️ POST arrive for product {product_id} by {actor}");
    let orders = api.mark_product_arrived(product_id, details, &actor).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(book_shipment => Post "/orders/{number}/book_shipment" impl ShopBackend, ShippingProvider);
pub async fn book_shipment<B, S>(
    path: web::Path<OrderNumber>,
    body: web::Json<BookShipmentParams>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let number = path.into_inner();
    let BookShipmentParams { courier, actor } = body.into_inner();
    debug!("💻️ POST book {courier} shipment for {number}");
    let order = api.book_shipment(&number, &courier, &actor).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(ship_order => Post "/orders/{number}/ship" impl ShopBackend, ShippingProvider);
pub async fn ship_order<B, S>(
    path: web::Path<OrderNumber>,
    body: web::Json<ShipParams>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let number = path.into_inner();
    let ShipParams { courier, tracking_number, actor } = body.into_inner();
    debug!("💻️ POST ship {number} with {courier}");
    let outcome = api.ship(&number, ShipmentDetails { courier, tracking_number }, &actor).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(cancel_order => Post "/orders/{number}/cancel" impl ShopBackend, ShippingProvider);
pub async fn cancel_order<B, S>(
    path: web::Path<OrderNumber>,
    body: web::Json<CancelParams>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let number = path.into_inner();
    let CancelParams { reason, actor } = body.into_inner();
    debug!("💻️ POST cancel {number} by {actor}");
    let outcome = api.cancel(&number, &reason, &actor).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(confirm_delivery => Post "/orders/{number}/deliver" impl ShopBackend, ShippingProvider);
pub async fn confirm_delivery<B, S>(
    path: web::Path<OrderNumber>,
    body: web::Json<ActorParams>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let number = path.into_inner();
    debug!("💻️ POST deliver {number}");
    let order = api.confirm_delivery(&number, &body.actor).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(refund_order => Post "/orders/{number}/refund" impl ShopBackend, ShippingProvider);
pub async fn refund_order<B, S>(
    path: web::Path<OrderNumber>,
    body: web::Json<RefundParams>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let number = path.into_inner();
    let RefundParams { amount, reason, actor } = body.into_inner();
    debug!("💻️ POST refund {amount} on {number}");
    let outcome = api.refund(&number, amount, &reason, &actor).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(add_order_note => Post "/orders/{number}/notes" impl ShopBackend, ShippingProvider);
pub async fn add_order_note<B, S>(
    path: web::Path<OrderNumber>,
    body: web::Json<NoteParams>,
    api: web::Data<OrderFlowApi<B, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    S: ShippingProvider,
{
    let number = path.into_inner();
    let NoteParams { note, customer_visible, actor } = body.into_inner();
    let log = api.add_note(&number, &actor, &note, customer_visible).await?;
    Ok(HttpResponse::Created().json(log))
}

route!(confirm_payment => Post "/invoices/{number}/confirm" impl ShopBackend, PaymentGateway);
/// Records a payment that arrived outside the gateway, such as a bank transfer checked by hand.
pub async fn confirm_payment<B, G>(
    path: web::Path<InvoiceNumber>,
    body: web::Json<ConfirmPaymentParams>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    G: PaymentGateway,
{
    let number = path.into_inner();
    let ConfirmPaymentParams { method, actor } = body.into_inner();
    debug!("💻️ POST confirm {number} paid by {method}, by {actor}");
    let outcome = api.confirm_manually(&number, method, &actor).await?;
    Ok(HttpResponse::Ok().json(PaymentResult::from(outcome)))
}

route!(trial_balance => Get "/ledger/trial_balance" impl ShopBackend);
pub async fn trial_balance<B: ShopBackend>(api: web::Data<LedgerApi<B>>) -> Result<HttpResponse, ServerError> {
    let balance = api.trial_balance().await?;
    if !balance.is_balanced() {
        let (debit, credit) = (balance.total_debit, balance.total_credit);
        error!("📒️ The trial balance does not balance! Debits {debit} credits {credit}");
    }
    Ok(HttpResponse::Ok().json(balance))
}

route!(settings => Get "/settings" impl ShopBackend);
pub async fn settings<B: ShopBackend>(api: web::Data<SettingsApi<B>>) -> Result<HttpResponse, ServerError> {
    let settings = api.all_settings().await?;
    Ok(HttpResponse::Ok().json(settings))
}

route!(update_setting => Post "/settings/{key}" impl ShopBackend);
/// Sets one business setting. The body is the raw value, e.g. `40` for the deposit percentage.
pub async fn update_setting<B: ShopBackend>(
    path: web::Path<String>,
    body: String,
    api: web::Data<SettingsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let key = path.into_inner();
    let value = body.trim();
    info!("🪛️ Setting {key} to '{value}'");
    let setting = api.update(&key, value).await?;
    Ok(HttpResponse::Ok().json(setting))
}

route!(run_sweep => Post "/sweep" impl ShopBackend);
/// Runs the expiration sweep now, rather than waiting for the next tick.
pub async fn run_sweep<B: ShopBackend>(api: web::Data<SweepApi<B>>) -> Result<HttpResponse, ServerError> {
    let report = api.run(Utc::now()).await?;
    Ok(HttpResponse::Ok().json(report))
}

//----------------------------------------------   Gateway  ----------------------------------------------------
route!(gateway_notify => Post "/notify" impl ShopBackend, PaymentGateway);
/// Push notifications from the payment gateway. The signature over the raw body is checked by the engine before the
/// body is parsed.
pub async fn gateway_notify<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    G: PaymentGateway,
{
    trace!("💻️ Received gateway notification");
    let signature = req.headers().get(GATEWAY_SIGNATURE_HEADER).and_then(|h| h.to_str().ok()).unwrap_or_default();
    let outcome = api.handle_notification(body.as_ref(), signature).await?;
    debug!("💻️ Notification for {} handled", outcome.invoice().invoice_number);
    Ok(HttpResponse::Ok().json(PaymentResult::from(outcome)))
}

route!(gateway_return => Get "/return" impl ShopBackend, PaymentGateway);
/// The customer lands here after paying. The query string is only used to find the attempt; the gateway is asked
/// for the actual status.
pub async fn gateway_return<B, G>(
    query: web::Query<ReturnParams>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: ShopBackend,
    G: PaymentGateway,
{
    let merchant_ref = query.into_inner().order_id;
    debug!("💻️ Customer returned from the gateway for {merchant_ref}");
    let outcome = api.handle_return(&merchant_ref).await?;
    Ok(HttpResponse::Ok().json(PaymentResult::from(outcome)))
}

//----------------------------------------------   Shipping  ----------------------------------------------------
route!(shipping_webhook => Post "/webhook" impl ShopBackend, ShippingProvider);
/// Status updates from the shipping provider. The HMAC middleware has already checked the signature.
pub async fn shipping_webhook<B, S>(body: web::Bytes, api: web::Data<OrderFlowApi<B, S>>) -> HttpResponse
where
    B: ShopBackend,
    S: ShippingProvider,
{
    // Webhook responses must always be in 200 range, otherwise the provider will retry
    let result = match ShipmentWebhook::from_body(body.as_ref()) {
        Err(e) => {
            warn!("🚚️ Could not read shipping webhook. {e}");
            JsonResponse::failure(e)
        },
        Ok(hook) => match hook.status.parse::<ShipmentStatus>() {
            Err(_) => {
                debug!("🚚️ Ignoring shipment status '{}' for {}", hook.status, hook.shipment_id);
                JsonResponse::success("Status ignored.")
            },
            Ok(status) => match api.apply_shipment_update(&hook.shipment_id, status).await {
                Ok(order) => {
                    let (number, order_status) = (order.order_number, order.status);
                    info!("🚚️ Shipment {} is {status}. Order {number} is {order_status}", hook.shipment_id);
                    JsonResponse::success("Update applied.")
                },
                Err(e) => {
                    warn!("🚚️ Could not apply {status} to shipment {}. {e}", hook.shipment_id);
                    JsonResponse::failure(e)
                },
            },
        },
    };
    HttpResponse::Ok().json(result)
}
