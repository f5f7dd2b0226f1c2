#![allow(dead_code)]
//! A fully wired engine on a fresh database, with mock collaborators.
use std::sync::Arc;

use log::*;
use shopkeep_common::Secret;
use shopkeep_engine::{
    db_types::{Invoice, PaymentMethod, Product},
    events::EventProducers,
    test_utils::{
        mocks::{MockGateway, MockShipper},
        prepare_env::{prepare_test_env, random_db_path},
    },
    traits::{GatewayPaymentStatus, SettlementOutcome},
    CatalogManagement,
    InvoiceApi,
    LedgerApi,
    OrderFlowApi,
    ReconciliationApi,
    SettingsApi,
    SqliteDatabase,
    SweepApi,
    WalletApi,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const SIGNING_KEY: &str = "gateway-test-signing-key";

pub struct Shop {
    pub url: String,
    pub db: SqliteDatabase,
    pub settings: Arc<SettingsApi<SqliteDatabase>>,
    pub orders: OrderFlowApi<SqliteDatabase, MockShipper>,
    pub payments: ReconciliationApi<SqliteDatabase, MockGateway>,
    pub invoices: InvoiceApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
    pub wallets: WalletApi<SqliteDatabase>,
    pub sweep: SweepApi<SqliteDatabase>,
    pub gateway: MockGateway,
    pub shipper: MockShipper,
}

impl Shop {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let settings = Arc::new(SettingsApi::new(db.clone()));
        let gateway = MockGateway::new();
        let shipper = MockShipper::new();
        let orders = OrderFlowApi::new(db.clone(), Arc::clone(&settings), shipper.clone(), producers.clone());
        let key = Secret::new(SIGNING_KEY.to_string());
        let payments = ReconciliationApi::new(db.clone(), gateway.clone(), producers.clone(), key);
        let sweep = SweepApi::new(db.clone(), Arc::clone(&settings), producers);
        Self {
            invoices: InvoiceApi::new(db.clone()),
            ledger: LedgerApi::new(db.clone()),
            wallets: WalletApi::new(db.clone()),
            url,
            db,
            settings,
            orders,
            payments,
            sweep,
            gateway,
            shipper,
        }
    }

    /// Pays an invoice through the gateway: start a payment, have the gateway settle it and let an inquiry find out.
    pub async fn pay(&self, invoice: &Invoice) -> SettlementOutcome {
        let session = self
            .payments
            .start_payment(&invoice.invoice_number, PaymentMethod::from("bca_va"))
            .await
            .expect("Error starting payment");
        let merchant_ref = session.attempt.merchant_ref;
        self.gateway.set_status(&merchant_ref, GatewayPaymentStatus::Paid, None);
        self.payments.inquire(&merchant_ref).await.expect("Error settling payment")
    }

    pub async fn product(&self, id: i64) -> Product {
        self.db.fetch_product(id).await.expect("Error fetching product").expect("Product does not exist")
    }

    pub async fn tear_down(self) {
        self.db.close().await;
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🚀️ Could not remove test database {}: {e}", self.url);
        }
    }
}
