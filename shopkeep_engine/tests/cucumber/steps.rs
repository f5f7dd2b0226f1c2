use std::time::Duration;

use chrono::Utc;
use cucumber::{then, when};
use shopkeep_engine::{
    db_types::{Money, PaymentMethod},
    test_utils::fixtures::order_for,
    traits::{ArrivalDetails, GatewayPaymentStatus, ShipmentDetails},
    EngineError,
};

use crate::cucumber::ShopWorld;

#[when(expr = "'{word}' checks out {int} of '{word}' as order '{word}'")]
async fn checkout(world: &mut ShopWorld, user: String, qty: i64, sku: String, name: String) {
    let product_id = world.product(&sku).id;
    let result =
        world.shop().orders.checkout(order_for(Some(&user), product_id, qty)).await.expect("Error during checkout");
    world.orders.insert(name, result.order.order_number);
}

#[when(expr = "'{word}' tries to check out {int} of '{word}'")]
async fn try_checkout(world: &mut ShopWorld, user: String, qty: i64, sku: String) {
    let product_id = world.product(&sku).id;
    world.last_error = world.shop().orders.checkout(order_for(Some(&user), product_id, qty)).await.err();
}

#[when(expr = "the customer starts paying order '{word}'")]
async fn start_payment(world: &mut ShopWorld, name: String) {
    let invoice = world.open_invoice(&name).await;
    let session = world
        .shop()
        .payments
        .start_payment(&invoice.invoice_number, PaymentMethod::from("bca_va"))
        .await
        .expect("Error starting payment");
    world.attempts.insert(name, session.attempt.merchant_ref);
}

#[when(expr = "the gateway reports the payment for order '{word}' as paid")]
async fn gateway_paid(world: &mut ShopWorld, name: String) {
    let merchant_ref = world.attempts.get(&name).cloned().unwrap_or_else(|| panic!("No payment started for {name}"));
    world.shop().gateway.set_status(&merchant_ref, GatewayPaymentStatus::Paid, None);
    world.shop().payments.inquire(&merchant_ref).await.expect("Error settling payment");
}

#[when(expr = "the customer pays the open invoice of order '{word}'")]
async fn pay_open_invoice(world: &mut ShopWorld, name: String) {
    let invoice = world.open_invoice(&name).await;
    world.shop().pay(&invoice).await;
}

#[when(expr = "the goods for order '{word}' arrive")]
async fn goods_arrive(world: &mut ShopWorld, name: String) {
    let number = world.order_number(&name).clone();
    world.shop().orders.mark_arrived(&number, ArrivalDetails::default(), "admin").await.expect("Error marking arrival");
}

#[when(expr = "order '{word}' ships with {word}")]
async fn ship(world: &mut ShopWorld, name: String, courier: String) {
    let number = world.order_number(&name).clone();
    let details = ShipmentDetails { courier, tracking_number: Some(format!("TRK-{name}")) };
    world.shop().orders.ship(&number, details, "admin").await.expect("Error shipping order");
}

#[when(expr = "order '{word}' is cancelled")]
async fn cancel(world: &mut ShopWorld, name: String) {
    let number = world.order_number(&name).clone();
    world.shop().orders.cancel(&number, "Cancelled in test", "admin").await.expect("Error cancelling order");
}

#[when(expr = "order '{word}' is refunded {int}")]
async fn refund(world: &mut ShopWorld, name: String, amount: i64) {
    let number = world.order_number(&name).clone();
    let result = world.shop().orders.refund(&number, Money::from(amount), "Refund in test", "admin").await;
    world.last_error = result.err();
}

#[when(expr = "the sweep runs {int} hours from now")]
async fn sweep(world: &mut ShopWorld, hours: i64) {
    let now = Utc::now() + chrono::Duration::hours(hours);
    world.shop().sweep.run(now).await.expect("Error running the sweep");
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut ShopWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "order '{word}' is '{word}' and '{word}'")]
async fn order_status(world: &mut ShopWorld, name: String, status: String, payment_status: String) {
    let order = world.order(&name).await;
    assert_eq!(order.status.to_string(), status, "Order status is incorrect");
    assert_eq!(order.payment_status.to_string(), payment_status, "Payment status is incorrect");
}

#[then(expr = "order '{word}' has a remaining balance of {int}")]
async fn remaining_balance(world: &mut ShopWorld, name: String, amount: i64) {
    let order = world.order(&name).await;
    assert_eq!(order.remaining_balance, Money::from(amount));
}

#[then(expr = "product '{word}' has {int} in stock and {int} reserved")]
async fn product_stock(world: &mut ShopWorld, sku: String, stock: i64, reserved: i64) {
    let id = world.product(&sku).id;
    let product = world.shop().product(id).await;
    assert_eq!(product.stock, stock, "Stock is incorrect");
    assert_eq!(product.reserved_qty, reserved, "Reserved quantity is incorrect");
}

#[then("the checkout is refused as sold out")]
async fn sold_out(world: &mut ShopWorld) {
    let err = world.last_error.take();
    assert!(matches!(err, Some(EngineError::SoldOut { .. })), "Expected a sold-out error, got {err:?}");
}

#[then(expr = "the refund is refused with {int} still refundable")]
async fn refund_refused(world: &mut ShopWorld, refundable: i64) {
    let err = world.last_error.take();
    match err {
        Some(EngineError::RefundExceedsPaid { refundable: r, .. }) => assert_eq!(r, Money::from(refundable)),
        other => panic!("Expected the refund to be refused, got {other:?}"),
    }
}

#[then(expr = "account '{word}' has a balance of {int}")]
async fn account_balance(world: &mut ShopWorld, code: String, amount: i64) {
    let account = world.shop().ledger.account_by_code(&code).await.expect("Error fetching account");
    let account = account.unwrap_or_else(|| panic!("Account {code} does not exist"));
    assert_eq!(account.balance, Money::from(amount), "Balance of account {code} ({}) is incorrect", account.name);
}

#[then(expr = "the wallet of '{word}' holds {int}")]
async fn wallet_balance(world: &mut ShopWorld, user: String, amount: i64) {
    let balance = world.shop().wallets.balance(&user).await.expect("Error fetching wallet");
    assert_eq!(balance, Money::from(amount), "Wallet balance of {user} is incorrect");
}

#[then("the books balance")]
async fn books_balance(world: &mut ShopWorld) {
    let balance = world.shop().ledger.trial_balance().await.expect("Error fetching trial balance");
    assert!(balance.is_balanced(), "Debits {} and credits {} differ", balance.total_debit, balance.total_credit);
}
