use futures_util::future::join_all;
use log::*;
use shopkeep_engine::{
    db_types::{Money, PaymentMethod, StockState},
    test_utils::fixtures::{order_for, stocked_product},
    traits::{GatewayPaymentStatus, SettlementOutcome},
    EngineError,
};

mod support;

use support::Shop;

const BUYERS: i64 = 12;

#[tokio::test]
async fn the_last_unit_goes_to_one_buyer() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "LAST", 100_000, 1).await;
    let (a, b) = tokio::join!(
        shop.orders.checkout(order_for(Some("sari"), tee.id, 1)),
        shop.orders.checkout(order_for(Some("budi"), tee.id, 1)),
    );
    let (won, lost) = match (a, b) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
        (a, b) => panic!("Exactly one checkout should succeed. Got {a:?} and {b:?}"),
    };
    assert_eq!(won.order.stock_state, StockState::Reserved);
    assert!(matches!(lost, EngineError::SoldOut { available: 0, .. }));
    let product = shop.product(tee.id).await;
    assert_eq!(product.reserved_qty, 1);
    assert_eq!(product.stock, 1);
    shop.tear_down().await;
}

#[tokio::test]
async fn a_rush_of_buyers_never_oversells() {
    let shop = Shop::new().await;
    let stock = 5;
    let tee = stocked_product(&shop.db, "RUSH", 100_000, stock).await;
    let checkouts = (0..BUYERS).map(|i| {
        let user = format!("buyer{i}");
        let order = order_for(Some(user.as_str()), tee.id, 1);
        shop.orders.checkout(order)
    });
    let results = join_all(checkouts).await;
    let placed = results.iter().filter(|r| r.is_ok()).count() as i64;
    let sold_out = results.iter().filter(|r| matches!(r, Err(EngineError::SoldOut { .. }))).count() as i64;
    info!("🚀️ {placed} orders placed, {sold_out} turned away");
    assert_eq!(placed, stock);
    assert_eq!(sold_out, BUYERS - stock);
    let product = shop.product(tee.id).await;
    assert_eq!(product.reserved_qty, stock);
    assert_eq!(product.available(), 0);
    shop.tear_down().await;
}

#[tokio::test]
async fn simultaneous_payment_signals_settle_once() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 250_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    let session = shop.payments.start_payment(&invoice.invoice_number, PaymentMethod::from("bca_va")).await.unwrap();
    let merchant_ref = session.attempt.merchant_ref;
    shop.gateway.set_status(&merchant_ref, GatewayPaymentStatus::Paid, None);

    let signals = (0..6).map(|i| {
        let merchant_ref = merchant_ref.clone();
        let payments = &shop.payments;
        let number = invoice.invoice_number.clone();
        async move {
            match i % 3 {
                0 => payments.inquire(&merchant_ref).await,
                1 => payments.handle_return(&merchant_ref).await,
                _ => payments.confirm_manually(&number, PaymentMethod::from("bca_va"), "admin").await,
            }
        }
    });
    let outcomes = join_all(signals).await;
    let finalized = outcomes.iter().filter(|o| matches!(o, Ok(SettlementOutcome::Finalized { .. }))).count();
    let repeats = outcomes.iter().filter(|o| matches!(o, Ok(SettlementOutcome::AlreadyProcessed { .. }))).count();
    assert_eq!(finalized, 1, "Outcomes: {outcomes:?}");
    assert_eq!(repeats, 5);

    let entries = shop.ledger.entries_for("invoice", invoice.invoice_number.as_str()).await.unwrap();
    assert_eq!(entries.len(), 1);
    let bank = shop.ledger.account_by_code("1101").await.unwrap().unwrap();
    assert_eq!(bank.balance, Money::from(250_000));
    let product = shop.product(tee.id).await;
    assert_eq!(product.stock, 9);
    assert_eq!(product.reserved_qty, 0);
    shop.tear_down().await;
}

#[tokio::test]
async fn wallet_spending_races_cannot_overdraw() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let topup = shop.invoices.create_topup("sari", Money::from(150_000)).await.unwrap();
    shop.pay(&topup).await;
    let first = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let second = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let (a, b) = tokio::join!(
        shop.payments.pay_with_wallet(&first.invoices[0].invoice_number, "sari"),
        shop.payments.pay_with_wallet(&second.invoices[0].invoice_number, "sari"),
    );
    let paid = [&a, &b].iter().filter(|r| matches!(r, Ok(SettlementOutcome::Finalized { .. }))).count();
    let refused = [&a, &b].iter().filter(|r| matches!(r, Err(EngineError::InsufficientWalletFunds { .. }))).count();
    assert_eq!(paid, 1, "Results: {a:?} / {b:?}");
    assert_eq!(refused, 1);
    let wallet = shop.wallets.wallet("sari").await.unwrap().unwrap();
    assert_eq!(wallet.balance, Money::from(50_000));
    assert!(shop.ledger.trial_balance().await.unwrap().is_balanced());
    shop.tear_down().await;
}
