use shopkeep_engine::{
    db_types::{
        DepositRule,
        DiscountKind,
        InvoiceStatus,
        InvoiceType,
        Money,
        NewDiscountCode,
        NewOrderItem,
        OrderStatusType,
        PaymentStatus,
        PreOrderConfig,
        StockState,
    },
    test_utils::fixtures::{customer_address, order_for, preorder_product, stocked_product},
    traits::{ArrivalDetails, SettlementOutcome},
    CatalogManagement,
    EngineError,
};

mod support;

use support::Shop;

#[tokio::test]
async fn checkout_reserves_stock_and_opens_one_invoice() {
    let shop = Shop::new().await;
    let product = stocked_product(&shop.db, "TEE-BLK-M", 150_000, 10).await;
    let order = order_for(Some("sari"), product.id, 3).with_shipping(customer_address(), Money::from(20_000));
    let result = shop.orders.checkout(order).await.expect("Error placing order");
    assert_eq!(result.order.subtotal, Money::from(450_000));
    assert_eq!(result.order.total, Money::from(470_000));
    assert_eq!(result.order.status, OrderStatusType::Pending);
    assert_eq!(result.order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(result.order.stock_state, StockState::Reserved);
    assert_eq!(result.order.remaining_balance, Money::from(470_000));
    assert_eq!(result.order.weight_grams, 1500);
    assert_eq!(result.invoices.len(), 1);
    let invoice = &result.invoices[0];
    assert_eq!(invoice.invoice_type, InvoiceType::Full);
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    assert_eq!(invoice.amount, Money::from(470_000));

    let product = shop.product(product.id).await;
    assert_eq!(product.stock, 10);
    assert_eq!(product.reserved_qty, 3);
    assert_eq!(product.available(), 7);
    shop.tear_down().await;
}

#[tokio::test]
async fn repeated_lines_are_merged() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let cap = stocked_product(&shop.db, "CAP", 50_000, 10).await;
    let mut order = order_for(None, tee.id, 1);
    order.items.push(NewOrderItem::new(cap.id, 2));
    order.items.push(NewOrderItem::new(tee.id, 2));
    let result = shop.orders.checkout(order).await.expect("Error placing order");
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[0].product_id, tee.id);
    assert_eq!(result.items[0].quantity, 3);
    assert_eq!(result.items[0].line_total, Money::from(300_000));
    assert_eq!(result.items[1].quantity, 2);
    assert_eq!(result.order.subtotal, Money::from(400_000));
    let tee = shop.product(tee.id).await;
    assert_eq!(tee.reserved_qty, 3);
    shop.tear_down().await;
}

#[tokio::test]
async fn sold_out_checkout_changes_nothing() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 5).await;
    let cap = stocked_product(&shop.db, "CAP", 50_000, 1).await;
    let mut order = order_for(Some("sari"), tee.id, 2);
    order.items.push(NewOrderItem::new(cap.id, 2));
    let err = shop.orders.checkout(order).await.expect_err("Checkout should have failed");
    match err {
        EngineError::SoldOut { product_id, requested, available } => {
            assert_eq!(product_id, cap.id);
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        },
        e => panic!("Expected SoldOut, got {e}"),
    }
    // the reservation on the first line was rolled back with the rest of the checkout
    let tee = shop.product(tee.id).await;
    assert_eq!(tee.reserved_qty, 0);
    let orders = shop.orders.search_orders(Default::default()).await.unwrap();
    assert!(orders.is_empty());
    shop.tear_down().await;
}

#[tokio::test]
async fn invalid_checkouts_are_rejected() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 5).await;
    let err = shop.orders.checkout(order_for(None, tee.id, 0)).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    let err = shop.orders.checkout(order_for(None, 9999, 1)).await.unwrap_err();
    assert!(matches!(err, EngineError::SoldOut { .. } | EngineError::ProductNotFound(_)));
    let mut empty = order_for(None, tee.id, 1);
    empty.items.clear();
    assert!(matches!(shop.orders.checkout(empty).await, Err(EngineError::Validation(_))));
    shop.tear_down().await;
}

#[tokio::test]
async fn discount_codes_are_priced_by_the_engine() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 200_000, 10).await;
    let code = NewDiscountCode {
        code: "HEMAT10".into(),
        kind: DiscountKind::Percentage,
        value: 10,
        min_order: Money::from(100_000),
        max_discount: Some(Money::from(30_000)),
        usage_limit: Some(1),
        starts_at: None,
        ends_at: None,
    };
    shop.db.create_discount_code(code).await.expect("Error creating discount code");

    let order = order_for(Some("sari"), tee.id, 1).with_discount_code("HEMAT10");
    let result = shop.orders.checkout(order).await.expect("Error placing order");
    assert_eq!(result.order.discount_amount, Money::from(20_000));
    assert_eq!(result.order.discount_code.as_deref(), Some("HEMAT10"));
    assert_eq!(result.order.total, Money::from(180_000));
    assert_eq!(result.invoices[0].amount, Money::from(180_000));

    // the code has a single use, and it is gone
    let order = order_for(Some("budi"), tee.id, 1).with_discount_code("HEMAT10");
    let err = shop.orders.checkout(order).await.unwrap_err();
    assert!(matches!(err, EngineError::DiscountRejected(_)), "{err}");
    let tee = shop.product(tee.id).await;
    assert_eq!(tee.reserved_qty, 1);

    let order = order_for(Some("budi"), tee.id, 1).with_discount_code("NOSUCHCODE");
    assert!(matches!(shop.orders.checkout(order).await, Err(EngineError::DiscountRejected(_))));
    shop.tear_down().await;
}

#[tokio::test]
async fn paying_a_full_invoice_commits_the_stock() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 2)).await.unwrap();
    let outcome = shop.pay(&result.invoices[0]).await;
    let SettlementOutcome::Finalized { invoice, order: Some(order) } = outcome else {
        panic!("Expected the invoice to be finalized, got {outcome:?}");
    };
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert!(invoice.paid_at.is_some());
    assert_eq!(order.status, OrderStatusType::Processing);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.stock_state, StockState::Committed);
    assert!(order.remaining_balance.is_zero());
    let tee = shop.product(tee.id).await;
    assert_eq!(tee.stock, 8);
    assert_eq!(tee.reserved_qty, 0);
    shop.tear_down().await;
}

#[tokio::test]
async fn pre_order_from_deposit_to_balance() {
    let shop = Shop::new().await;
    let figure = preorder_product(&shop.db, "FIG-01", 1_000_000, 20, None).await;
    let result = shop.orders.checkout(order_for(Some("sari"), figure.id, 1)).await.expect("Error placing pre-order");
    assert_eq!(result.order.status, OrderStatusType::Pending);
    assert_eq!(result.invoices.len(), 2);
    let deposit = result.invoices.iter().find(|i| i.invoice_type == InvoiceType::Deposit).unwrap();
    let balance = result.invoices.iter().find(|i| i.invoice_type == InvoiceType::Balance).unwrap();
    assert_eq!(deposit.amount, Money::from(300_000));
    assert_eq!(deposit.status, InvoiceStatus::Unpaid);
    assert_eq!(balance.amount, Money::from(700_000));
    assert_eq!(balance.status, InvoiceStatus::PendingArrival);
    assert_eq!(result.payable_invoice().map(|i| i.id), Some(deposit.id));

    let outcome = shop.pay(deposit).await;
    let SettlementOutcome::Finalized { order: Some(order), .. } = outcome else {
        panic!("Expected the deposit to be finalized, got {outcome:?}");
    };
    assert_eq!(order.status, OrderStatusType::PreOrder);
    assert_eq!(order.payment_status, PaymentStatus::DepositPaid);
    assert_eq!(order.deposit_paid, Money::from(300_000));
    assert_eq!(order.remaining_balance, Money::from(700_000));
    assert_eq!(order.stock_state, StockState::Reserved);
    // deposits are a liability until the goods ship
    let deposits = shop.ledger.account_by_code("2101").await.unwrap().unwrap();
    assert_eq!(deposits.balance, Money::from(300_000));

    let order = shop
        .orders
        .mark_arrived(&order.order_number, ArrivalDetails::default(), "admin")
        .await
        .expect("Error marking arrival");
    assert_eq!(order.status, OrderStatusType::PaymentDue);
    let balance = shop.invoices.fetch_invoice(&balance.invoice_number).await.unwrap();
    assert_eq!(balance.status, InvoiceStatus::Unpaid);
    let due = balance.due_date.expect("Balance invoice should have a due date");
    let days = (due - chrono::Utc::now()).num_hours();
    assert!((6 * 24..=7 * 24).contains(&days), "due in {days} hours");

    let outcome = shop.pay(&balance).await;
    let SettlementOutcome::Finalized { order: Some(order), .. } = outcome else {
        panic!("Expected the balance to be finalized, got {outcome:?}");
    };
    assert_eq!(order.status, OrderStatusType::Processing);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.remaining_balance.is_zero());
    assert_eq!(order.stock_state, StockState::Committed);
    shop.tear_down().await;
}

#[tokio::test]
async fn arrival_can_requote_shipping() {
    let shop = Shop::new().await;
    let figure = preorder_product(&shop.db, "FIG-02", 500_000, 5, Some(50)).await;
    let order = order_for(Some("sari"), figure.id, 2).with_shipping(customer_address(), Money::from(30_000));
    let result = shop.orders.checkout(order).await.unwrap();
    let deposit = result.payable_invoice().unwrap().clone();
    // shipping is settled with the balance, so the deposit is half the goods only
    assert_eq!(deposit.amount, Money::from(500_000));
    shop.pay(&deposit).await;

    let details = ArrivalDetails { shipping_cost: Some(Money::from(45_000)) };
    let order = shop.orders.mark_arrived(&result.order.order_number, details, "admin").await.unwrap();
    assert_eq!(order.shipping_cost, Money::from(45_000));
    assert_eq!(order.total, Money::from(1_045_000));
    let invoices = shop.invoices.invoices_for_order(&order.order_number).await.unwrap();
    let balance = invoices.iter().find(|i| i.invoice_type == InvoiceType::Balance).unwrap();
    assert_eq!(balance.amount, Money::from(545_000));
    assert_eq!(balance.status, InvoiceStatus::Unpaid);

    // arriving twice is not a valid transition
    let err = shop.orders.mark_arrived(&order.order_number, ArrivalDetails::default(), "admin").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }), "{err}");
    shop.tear_down().await;
}

#[tokio::test]
async fn arrival_of_a_product_moves_every_waiting_order() {
    let shop = Shop::new().await;
    let figure = preorder_product(&shop.db, "FIG-03", 400_000, 10, None).await;
    let mut numbers = Vec::new();
    for user in ["sari", "budi", "dewi"] {
        let result = shop.orders.checkout(order_for(Some(user), figure.id, 1)).await.unwrap();
        shop.pay(result.payable_invoice().unwrap()).await;
        numbers.push(result.order.order_number);
    }
    // an unpaid pre-order is not waiting for the goods yet
    let unpaid = shop.orders.checkout(order_for(Some("eko"), figure.id, 1)).await.unwrap();
    let arrived = shop.orders.mark_product_arrived(figure.id, ArrivalDetails::default(), "admin").await.unwrap();
    assert_eq!(arrived.len(), 3);
    assert!(arrived.iter().all(|o| o.status == OrderStatusType::PaymentDue));
    assert!(arrived.iter().all(|o| numbers.contains(&o.order_number)));
    let unpaid = shop.orders.fetch_order(&unpaid.order.order_number).await.unwrap();
    assert_eq!(unpaid.status, OrderStatusType::Pending);
    shop.tear_down().await;
}

#[tokio::test]
async fn zero_deposit_pre_orders_are_refused() {
    let shop = Shop::new().await;
    let config = PreOrderConfig {
        deposit: Some(DepositRule::FixedPerUnit { amount: Money::zero() }),
        ..Default::default()
    };
    let product = stocked_product(&shop.db, "FIG-04", 300_000, 5).await;
    shop.db.set_preorder_config(product.id, Some(config)).await.unwrap();
    let err = shop.orders.checkout(order_for(None, product.id, 1)).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)), "{err}");
    let product = shop.product(product.id).await;
    assert_eq!(product.reserved_qty, 0);
    shop.tear_down().await;
}
