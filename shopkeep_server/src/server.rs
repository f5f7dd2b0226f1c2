use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use gateway_tools::{PayGateApi, ShipperApi};
use log::*;
use shopkeep_common::Secret;
use shopkeep_engine::{
    events::{EventHandlers, EventProducers},
    traits::ManualShipping,
    InvoiceApi,
    LedgerApi,
    OrderFlowApi,
    PaymentGateway,
    ReconciliationApi,
    SettingsApi,
    ShippingProvider,
    SqliteDatabase,
    SweepApi,
    WalletApi,
};

use crate::{
    config::{ServerConfig, SHIPPER_SIGNATURE_HEADER},
    errors::ServerError,
    integrations::{PayGateGateway, ShipperProvider, ShippingBackend},
    middleware::HmacMiddlewareFactory,
    notifications::logging_hooks,
    routes::{
        health,
        AddOrderNoteRoute,
        AdminOrderRoute,
        BookShipmentRoute,
        CancelOrderRoute,
        CheckOrderStatusRoute,
        CheckoutRoute,
        ConfirmDeliveryRoute,
        ConfirmPaymentRoute,
        GatewayNotifyRoute,
        GatewayReturnRoute,
        InvoiceByNumberRoute,
        MarkArrivedRoute,
        MarkProductArrivedRoute,
        OrderByNumberRoute,
        PayInvoiceRoute,
        PayWithWalletRoute,
        PointOfSaleRoute,
        RefundOrderRoute,
        RunSweepRoute,
        SearchOrdersRoute,
        SettingsRoute,
        ShipOrderRoute,
        ShippingWebhookRoute,
        ShopBackend,
        TrialBalanceRoute,
        UpdateSettingRoute,
        WalletRoute,
        WalletTopupRoute,
    },
    sweep_worker::start_sweep_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    let handlers = EventHandlers::new(config.event_buffer_size, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let paygate = PayGateApi::new(config.paygate.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = PayGateGateway::new(paygate);
    let shipper = match &config.shipper {
        Some(shipper_config) => {
            let api =
                ShipperApi::new(shipper_config.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
            ShippingBackend::Provider(ShipperProvider::new(api))
        },
        None => ShippingBackend::Manual(ManualShipping),
    };
    let settings = Arc::new(SettingsApi::new(db.clone()));
    let sweep = SweepApi::new(db.clone(), settings.clone(), producers.clone());
    let _worker = start_sweep_worker(sweep, config.sweep_interval);

    let apis = ShopApis::new(db, gateway, shipper, producers, settings, config.gateway_signing_key.clone())
        .with_webhook_auth(config.shipper_webhook_secret.clone(), config.shipper_hmac_checks);
    let srv = create_server_instance(&config, apis)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<S, G>(
    config: &ServerConfig,
    apis: ShopApis<SqliteDatabase, S, G>,
) -> Result<Server, ServerError>
where
    S: ShippingProvider + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    info!("💻️ Binding to {}:{}", config.host, config.port);
    let srv = HttpServer::new(move || {
        let apis = apis.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("shopkeep::access_log"))
            .configure(move |cfg| apis.configure(cfg))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// The engine APIs the routes are served from, built once and shared by every worker.
pub struct ShopApis<B, S, G> {
    pub orders: web::Data<OrderFlowApi<B, S>>,
    pub payments: web::Data<ReconciliationApi<B, G>>,
    pub invoices: web::Data<InvoiceApi<B>>,
    pub wallets: web::Data<WalletApi<B>>,
    pub ledger: web::Data<LedgerApi<B>>,
    pub settings: web::Data<SettingsApi<B>>,
    pub sweep: web::Data<SweepApi<B>>,
    webhook_secret: Secret<String>,
    webhook_hmac_checks: bool,
}

impl<B, S, G> Clone for ShopApis<B, S, G> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            payments: self.payments.clone(),
            invoices: self.invoices.clone(),
            wallets: self.wallets.clone(),
            ledger: self.ledger.clone(),
            settings: self.settings.clone(),
            sweep: self.sweep.clone(),
            webhook_secret: self.webhook_secret.clone(),
            webhook_hmac_checks: self.webhook_hmac_checks,
        }
    }
}

impl<B, S, G> ShopApis<B, S, G>
where
    B: ShopBackend + Clone + 'static,
    S: ShippingProvider + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        db: B,
        gateway: G,
        shipper: S,
        producers: EventProducers,
        settings: Arc<SettingsApi<B>>,
        gateway_signing_key: Secret<String>,
    ) -> Self {
        let orders = OrderFlowApi::new(db.clone(), settings.clone(), shipper, producers.clone());
        let payments = ReconciliationApi::new(db.clone(), gateway, producers.clone(), gateway_signing_key);
        let sweep = SweepApi::new(db.clone(), settings.clone(), producers);
        Self {
            orders: web::Data::new(orders),
            payments: web::Data::new(payments),
            invoices: web::Data::new(InvoiceApi::new(db.clone())),
            wallets: web::Data::new(WalletApi::new(db.clone())),
            ledger: web::Data::new(LedgerApi::new(db)),
            settings: web::Data::from(settings),
            sweep: web::Data::new(sweep),
            webhook_secret: Secret::default(),
            webhook_hmac_checks: true,
        }
    }

    /// The secret the shipping provider signs its webhook calls with.
    pub fn with_webhook_auth(mut self, secret: Secret<String>, hmac_checks: bool) -> Self {
        self.webhook_secret = secret;
        self.webhook_hmac_checks = hmac_checks;
        self
    }

    pub fn configure(&self, cfg: &mut ServiceConfig) {
        let admin_scope = web::scope("/admin")
            .service(SearchOrdersRoute::<B, S>::new())
            .service(AdminOrderRoute::<B, S>::new())
            .service(MarkArrivedRoute::<B, S>::new())
            .service(MarkProductArrivedRoute::<B, S>::new())
            .service(BookShipmentRoute::<B, S>::new())
            .service(ShipOrderRoute::<B, S>::new())
            .service(CancelOrderRoute::<B, S>::new())
            .service(ConfirmDeliveryRoute::<B, S>::new())
            .service(RefundOrderRoute::<B, S>::new())
            .service(AddOrderNoteRoute::<B, S>::new())
            .service(ConfirmPaymentRoute::<B, G>::new())
            .service(TrialBalanceRoute::<B>::new())
            .service(SettingsRoute::<B>::new())
            .service(UpdateSettingRoute::<B>::new())
            .service(RunSweepRoute::<B>::new());
        let api_scope = web::scope("/api")
            .service(admin_scope)
            .service(CheckoutRoute::<B, S>::new())
            .service(PointOfSaleRoute::<B, S>::new())
            .service(OrderByNumberRoute::<B, S, G>::new())
            .service(CheckOrderStatusRoute::<B, G>::new())
            .service(InvoiceByNumberRoute::<B>::new())
            .service(PayInvoiceRoute::<B, G>::new())
            .service(PayWithWalletRoute::<B, G>::new())
            .service(WalletTopupRoute::<B>::new())
            .service(WalletRoute::<B>::new());
        let gateway_scope = web::scope("/gateway")
            .service(GatewayNotifyRoute::<B, G>::new())
            .service(GatewayReturnRoute::<B, G>::new());
        let hmac = HmacMiddlewareFactory::new(
            SHIPPER_SIGNATURE_HEADER,
            self.webhook_secret.clone(),
            self.webhook_hmac_checks,
        );
        let shipping_scope = web::scope("/shipping").wrap(hmac).service(ShippingWebhookRoute::<B, S>::new());
        cfg.app_data(self.orders.clone())
            .app_data(self.payments.clone())
            .app_data(self.invoices.clone())
            .app_data(self.wallets.clone())
            .app_data(self.ledger.clone())
            .app_data(self.settings.clone())
            .app_data(self.sweep.clone())
            .service(health)
            .service(api_scope)
            .service(gateway_scope)
            .service(shipping_scope);
    }
}
