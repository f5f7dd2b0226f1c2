use std::time::Duration;

use chrono::Utc;
use shopkeep_engine::{
    db_types::{AttemptStatus, InvoiceStatus, InvoiceType, Money, OrderStatusType, PaymentMethod, WalletTxType},
    helpers::calculate_hmac,
    test_utils::fixtures::{order_for, stocked_product},
    traits::{GatewayError, GatewayNotification, GatewayPaymentStatus, SettlementOutcome},
    EngineError,
};

mod support;

use support::{Shop, SIGNING_KEY};

fn signed(notification: &GatewayNotification) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(notification).expect("Error serializing notification");
    let signature = calculate_hmac(SIGNING_KEY, &body);
    (body, signature)
}

#[tokio::test]
async fn repeated_notifications_settle_once() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 250_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    let session = shop.payments.start_payment(&invoice.invoice_number, "bca_va".into()).await.unwrap();
    assert_eq!(session.attempt.status, AttemptStatus::Pending);
    assert!(session.redirect_url.is_some());
    let charges = shop.gateway.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount, Money::from(250_000));
    assert_eq!(charges[0].customer_name.as_deref(), Some("Sari Wulandari"));

    let merchant_ref = session.attempt.merchant_ref.clone();
    shop.gateway.set_status(&merchant_ref, GatewayPaymentStatus::Paid, None);
    let notification = shop.gateway.notification(&merchant_ref).unwrap();
    let (body, signature) = signed(&notification);
    let first = shop.payments.handle_notification(&body, &signature).await.expect("Error handling notification");
    assert!(first.is_new_settlement());
    let second = shop.payments.handle_notification(&body, &signature).await.expect("Error handling notification");
    assert!(matches!(second, SettlementOutcome::AlreadyProcessed { .. }), "{second:?}");
    // the customer coming back from the payment page is a third signal for the same payment
    let third = shop.payments.handle_return(&merchant_ref).await.unwrap();
    assert!(matches!(third, SettlementOutcome::AlreadyProcessed { .. }));

    let entries = shop.ledger.entries_for("invoice", invoice.invoice_number.as_str()).await.unwrap();
    assert_eq!(entries.len(), 1);
    let bank = shop.ledger.account_by_code("1101").await.unwrap().unwrap();
    assert_eq!(bank.balance, Money::from(250_000));
    let revenue = shop.ledger.account_by_code("4101").await.unwrap().unwrap();
    assert_eq!(revenue.balance, Money::from(250_000));

    let detail = shop.invoices.invoice_detail(&invoice.invoice_number).await.unwrap();
    assert_eq!(detail.invoice.status, InvoiceStatus::Paid);
    assert_eq!(detail.attempts.len(), 1);
    assert_eq!(detail.attempts[0].status, AttemptStatus::Success);
    assert_eq!(detail.attempts[0].gateway_ref.as_deref(), Some(format!("GW-{merchant_ref}").as_str()));
    shop.tear_down().await;
}

#[tokio::test]
async fn badly_signed_notifications_are_ignored() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 250_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let session = shop.payments.start_payment(&result.invoices[0].invoice_number, "qris".into()).await.unwrap();
    shop.gateway.set_status(&session.attempt.merchant_ref, GatewayPaymentStatus::Paid, None);
    let notification = shop.gateway.notification(&session.attempt.merchant_ref).unwrap();
    let (body, _) = signed(&notification);
    let forged = calculate_hmac("not-the-key", &body);
    let err = shop.payments.handle_notification(&body, &forged).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidSignature));
    let err = shop.payments.handle_notification(&body, "").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidSignature));

    let invoice = shop.invoices.fetch_invoice(&result.invoices[0].invoice_number).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    shop.tear_down().await;
}

#[tokio::test]
async fn amount_mismatch_leaves_the_invoice_unpaid() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 250_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    let session = shop.payments.start_payment(&invoice.invoice_number, "bca_va".into()).await.unwrap();
    let merchant_ref = session.attempt.merchant_ref;
    shop.gateway.set_status(&merchant_ref, GatewayPaymentStatus::Paid, Some(Money::from(25_000)));
    let err = shop.payments.inquire(&merchant_ref).await.unwrap_err();
    match err {
        EngineError::AmountMismatch { expected, received, .. } => {
            assert_eq!(expected, Money::from(250_000));
            assert_eq!(received, Money::from(25_000));
        },
        e => panic!("Expected an amount mismatch, got {e}"),
    }
    let invoice = shop.invoices.fetch_invoice(&invoice.invoice_number).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    let order = shop.orders.fetch_order(&result.order.order_number).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    let balance = shop.ledger.trial_balance().await.unwrap();
    assert!(balance.total_debit.is_zero());
    shop.tear_down().await;
}

#[tokio::test]
async fn unknown_references_are_reported() {
    let shop = Shop::new().await;
    let notification = GatewayNotification {
        merchant_ref: "MR-DOES-NOT-EXIST".into(),
        gateway_ref: None,
        status: GatewayPaymentStatus::Paid,
        amount: Some(Money::from(1000)),
        method: None,
    };
    let err = shop.payments.apply_gateway_status(notification, "gateway").await.unwrap_err();
    assert!(matches!(err, EngineError::ReferenceNotFound(_)));
    shop.tear_down().await;
}

#[tokio::test]
async fn invoice_numbers_are_accepted_as_references() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 90_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    let notification = GatewayNotification {
        merchant_ref: invoice.invoice_number.to_string(),
        gateway_ref: Some("GW-LEGACY-1".into()),
        status: GatewayPaymentStatus::Paid,
        amount: Some(invoice.amount),
        method: Some(PaymentMethod::from("mandiri_va")),
    };
    let outcome = shop.payments.apply_gateway_status(notification, "gateway").await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::Finalized { .. }));
    let attempts = shop.invoices.payment_attempts(&invoice.invoice_number).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Success);
    assert_eq!(attempts[0].payment_method.as_str(), "mandiri_va");
    shop.tear_down().await;
}

#[tokio::test]
async fn late_payment_goes_to_the_wallet() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 120_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    let session = shop.payments.start_payment(&invoice.invoice_number, "bca_va".into()).await.unwrap();
    let report = shop.sweep.run(Utc::now() + chrono::Duration::hours(25)).await.unwrap();
    assert_eq!(report.expired, vec![invoice.invoice_number.clone()]);
    assert_eq!(report.cancelled_orders, vec![result.order.order_number.clone()]);

    shop.gateway.set_status(&session.attempt.merchant_ref, GatewayPaymentStatus::Paid, None);
    let outcome = shop.payments.inquire(&session.attempt.merchant_ref).await.unwrap();
    let SettlementOutcome::FinalizedLate { invoice: late, wallet_tx: Some(tx) } = outcome else {
        panic!("Expected a late settlement, got {outcome:?}");
    };
    assert_eq!(late.status, InvoiceStatus::PaidLate);
    assert_eq!(tx.user_id, "sari");
    assert_eq!(tx.tx_type, WalletTxType::Credit);
    assert_eq!(tx.amount, Money::from(120_000));
    assert_eq!(shop.wallets.balance("sari").await.unwrap(), Money::from(120_000));

    // the order stays cancelled and the stock stays released
    let order = shop.orders.fetch_order(&result.order.order_number).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    let tee = shop.product(tee.id).await;
    assert_eq!(tee.reserved_qty, 0);
    assert_eq!(tee.stock, 10);

    let again = shop.payments.inquire(&session.attempt.merchant_ref).await.unwrap();
    assert!(matches!(again, SettlementOutcome::AlreadyProcessed { .. }));
    assert_eq!(shop.wallets.history("sari").await.unwrap().len(), 1);
    let books = shop.ledger.trial_balance().await.unwrap();
    assert!(books.is_balanced());
    shop.tear_down().await;
}

#[tokio::test]
async fn late_guest_payment_is_credited_to_a_guest_wallet() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 80_000, 10).await;
    let result = shop.orders.checkout(order_for(None, tee.id, 1)).await.unwrap();
    shop.orders.cancel(&result.order.order_number, "Changed my mind", "customer").await.unwrap();
    let outcome = shop
        .payments
        .confirm_manually(&result.invoices[0].invoice_number, PaymentMethod::from("manual_transfer"), "admin")
        .await
        .unwrap();
    assert!(matches!(outcome, SettlementOutcome::FinalizedLate { .. }));
    let owner = format!("guest:{}", result.order.order_number);
    assert_eq!(shop.wallets.balance(&owner).await.unwrap(), Money::from(80_000));
    shop.tear_down().await;
}

#[tokio::test]
async fn failed_attempts_keep_the_invoice_payable() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    let session = shop.payments.start_payment(&invoice.invoice_number, "bca_va".into()).await.unwrap();
    shop.gateway.set_status(&session.attempt.merchant_ref, GatewayPaymentStatus::Failed, None);
    let outcome = shop.payments.inquire(&session.attempt.merchant_ref).await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::AttemptFailed { .. }));
    let detail = shop.invoices.invoice_detail(&invoice.invoice_number).await.unwrap();
    assert_eq!(detail.invoice.status, InvoiceStatus::Unpaid);
    assert_eq!(detail.attempts[0].status, AttemptStatus::Failed);
    assert!(detail.attempts[0].failure_reason.is_some());

    // a pending attempt changes nothing either
    let retry = shop.payments.start_payment(&invoice.invoice_number, "qris".into()).await.unwrap();
    let outcome = shop.payments.inquire(&retry.attempt.merchant_ref).await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::Pending { .. }));

    shop.gateway.set_status(&retry.attempt.merchant_ref, GatewayPaymentStatus::Paid, None);
    let outcome = shop.payments.inquire(&retry.attempt.merchant_ref).await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::Finalized { .. }));
    let paid = shop.invoices.fetch_invoice(&invoice.invoice_number).await.unwrap();
    assert_eq!(paid.payment_method.as_ref().map(|m| m.as_str()), Some("qris"));

    // a failure reported after the invoice was paid does not undo anything
    shop.gateway.set_status(&session.attempt.merchant_ref, GatewayPaymentStatus::Expired, None);
    let outcome = shop.payments.inquire(&session.attempt.merchant_ref).await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::AlreadyProcessed { .. }));
    shop.tear_down().await;
}

#[tokio::test]
async fn gateway_outages_change_nothing() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    shop.gateway.set_offline(true);
    let err = shop.payments.start_payment(&invoice.invoice_number, "bca_va".into()).await.unwrap_err();
    assert!(matches!(err, EngineError::Gateway(GatewayError::Unreachable(_))), "{err}");
    let invoice = shop.invoices.fetch_invoice(&invoice.invoice_number).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    shop.gateway.set_offline(false);
    shop.tear_down().await;
}

#[tokio::test]
async fn slow_gateways_time_out() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let payments = shopkeep_engine::ReconciliationApi::new(
        shop.db.clone(),
        shop.gateway.clone(),
        Default::default(),
        shopkeep_common::Secret::new(SIGNING_KEY.to_string()),
    )
    .with_timeout(Duration::from_millis(50));
    shop.gateway.set_delay(Some(Duration::from_millis(500)));
    let err = payments.start_payment(&result.invoices[0].invoice_number, "bca_va".into()).await.unwrap_err();
    assert!(matches!(err, EngineError::Gateway(GatewayError::Timeout(_))), "{err}");
    shop.gateway.set_delay(None);
    shop.tear_down().await;
}

#[tokio::test]
async fn refreshing_an_order_tolerates_gateway_trouble() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    let session = shop.payments.start_payment(&invoice.invoice_number, "bca_va".into()).await.unwrap();
    shop.gateway.set_offline(true);
    let outcomes = shop.payments.refresh_order(&result.order).await;
    assert!(outcomes.is_empty());
    shop.gateway.set_offline(false);

    shop.gateway.set_status(&session.attempt.merchant_ref, GatewayPaymentStatus::Paid, None);
    let outcomes = shop.payments.check_order_status(&result.order.order_number).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_new_settlement());
    let order = shop.orders.fetch_order(&result.order.order_number).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Processing);
    // nothing left to ask about
    assert!(shop.payments.check_order_status(&order.order_number).await.unwrap().is_empty());
    shop.tear_down().await;
}

#[tokio::test]
async fn wallet_payments() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let topup = shop.invoices.create_topup("sari", Money::from(150_000)).await.unwrap();
    assert_eq!(topup.invoice_type, InvoiceType::Topup);
    let outcome = shop.pay(&topup).await;
    assert!(matches!(outcome, SettlementOutcome::Finalized { order: None, .. }), "{outcome:?}");
    assert_eq!(shop.wallets.balance("sari").await.unwrap(), Money::from(150_000));

    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    let err = shop.payments.start_payment(&invoice.invoice_number, PaymentMethod::wallet()).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    let err = shop.payments.pay_with_wallet(&invoice.invoice_number, "budi").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let outcome = shop.payments.pay_with_wallet(&invoice.invoice_number, "sari").await.unwrap();
    let SettlementOutcome::Finalized { order: Some(order), invoice } = outcome else {
        panic!("Expected a finalized wallet payment, got {outcome:?}");
    };
    assert_eq!(order.status, OrderStatusType::Processing);
    assert_eq!(invoice.payment_method, Some(PaymentMethod::wallet()));
    assert_eq!(shop.wallets.balance("sari").await.unwrap(), Money::from(50_000));
    let history = shop.wallets.history("sari").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().any(|tx| tx.tx_type == WalletTxType::Debit && tx.balance_after == Money::from(50_000)));

    // the second order costs more than what is left
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let err = shop.payments.pay_with_wallet(&result.invoices[0].invoice_number, "sari").await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientWalletFunds { .. }), "{err}");
    let invoice = shop.invoices.fetch_invoice(&result.invoices[0].invoice_number).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    assert_eq!(shop.wallets.balance("sari").await.unwrap(), Money::from(50_000));
    assert!(shop.ledger.trial_balance().await.unwrap().is_balanced());
    shop.tear_down().await;
}

#[tokio::test]
async fn invoices_marked_failed_can_still_be_settled_late() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    let failed = shop.invoices.mark_failed(&invoice.invoice_number, "Customer abandoned checkout").await.unwrap();
    assert_eq!(failed.status, InvoiceStatus::Failed);
    let err = shop.invoices.mark_failed(&invoice.invoice_number, "again").await.unwrap_err();
    assert!(matches!(err, EngineError::InvoiceNotPayable { .. }));
    let outcome = shop.payments.confirm_manually(&invoice.invoice_number, "manual_transfer".into(), "admin").await;
    assert!(matches!(outcome, Ok(SettlementOutcome::FinalizedLate { .. })));
    shop.tear_down().await;
}
