use chrono::Utc;
use shopkeep_engine::{
    db_types::{AccountType, Money, NewJournalEntry, NewJournalLine},
    test_utils::fixtures::{order_for, stocked_product},
    traits::AccountPurpose,
    LedgerError,
};

mod support;

use support::Shop;

#[tokio::test]
async fn default_chart_resolves_every_purpose() {
    let shop = Shop::new().await;
    let code = |purpose| {
        let ledger = &shop.ledger;
        async move { ledger.resolve(purpose).await.unwrap().code }
    };
    assert_eq!(code(AccountPurpose::Bank).await, "1101");
    assert_eq!(code(AccountPurpose::Cash).await, "1102");
    assert_eq!(code(AccountPurpose::Inventory).await, "1301");
    assert_eq!(code(AccountPurpose::CustomerDeposit).await, "2101");
    // no wallet_liability key in the default chart
    assert_eq!(code(AccountPurpose::WalletLiability).await, "2101");
    assert_eq!(code(AccountPurpose::SalesRevenue).await, "4101");
    assert_eq!(code(AccountPurpose::OtherIncome).await, "4201");
    assert_eq!(code(AccountPurpose::Cogs).await, "5101");
    let accounts = shop.ledger.accounts().await.unwrap();
    assert_eq!(accounts.len(), 8);
    assert!(accounts.iter().all(|a| a.balance.is_zero()));
    shop.tear_down().await;
}

#[tokio::test]
async fn store_credit_can_live_in_its_own_account() {
    let shop = Shop::new().await;
    sqlx::query(
        "INSERT INTO accounts (code, name, account_type, mapping_key) VALUES ('2102', 'Store credit', 'liability', \
         'wallet_liability')",
    )
    .execute(shop.db.pool())
    .await
    .expect("Error adding store credit account");
    assert_eq!(shop.ledger.resolve(AccountPurpose::WalletLiability).await.unwrap().code, "2102");

    let topup = shop.invoices.create_topup("sari", Money::from(100_000)).await.unwrap();
    shop.pay(&topup).await;
    let store_credit = shop.ledger.account_by_code("2102").await.unwrap().unwrap();
    assert_eq!(store_credit.balance, Money::from(100_000));
    let deposits = shop.ledger.account_by_code("2101").await.unwrap().unwrap();
    assert!(deposits.balance.is_zero(), "Top-ups end up as store credit, not as deposits");

    let tee = stocked_product(&shop.db, "TEE", 100_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    shop.payments.pay_with_wallet(&result.invoices[0].invoice_number, "sari").await.unwrap();
    let store_credit = shop.ledger.account_by_code("2102").await.unwrap().unwrap();
    assert!(store_credit.balance.is_zero());
    assert_eq!(shop.wallets.balance("sari").await.unwrap(), store_credit.balance);
    assert!(shop.ledger.trial_balance().await.unwrap().is_balanced());
    shop.tear_down().await;
}

#[tokio::test]
async fn manual_entries_must_balance() {
    let shop = Shop::new().await;
    let bank = shop.ledger.resolve(AccountPurpose::Bank).await.unwrap();
    let equity = shop.ledger.account_by_code("3101").await.unwrap().unwrap();
    assert_eq!(equity.account_type, AccountType::Equity);

    let lopsided = NewJournalEntry::new("manual", "capital-1", "Opening capital", Utc::now())
        .line(NewJournalLine::debit(bank.id, Money::from(5_000_000)))
        .line(NewJournalLine::credit(equity.id, Money::from(4_000_000)));
    let err = shop.ledger.post(lopsided).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unbalanced { debit, credit }
        if debit == Money::from(5_000_000) && credit == Money::from(4_000_000)));
    let bank_now = shop.ledger.account_by_code("1101").await.unwrap().unwrap();
    assert!(bank_now.balance.is_zero(), "Nothing is written for a rejected entry");
    assert!(shop.ledger.entries_for("manual", "capital-1").await.unwrap().is_empty());

    let empty = NewJournalEntry::new("manual", "nothing", "Nothing at all", Utc::now())
        .line(NewJournalLine::debit(bank.id, Money::zero()))
        .line(NewJournalLine::credit(equity.id, Money::zero()));
    assert!(matches!(shop.ledger.post(empty).await, Err(LedgerError::EmptyEntry)));

    let negative = NewJournalEntry::new("manual", "negative", "Backwards", Utc::now())
        .line(NewJournalLine::debit(bank.id, Money::from(-100)))
        .line(NewJournalLine::credit(equity.id, Money::from(-100)));
    assert!(matches!(shop.ledger.post(negative).await, Err(LedgerError::NegativeAmount)));

    let ghost = NewJournalEntry::new("manual", "ghost", "Unknown account", Utc::now())
        .line(NewJournalLine::debit(bank.id, Money::from(100)))
        .line(NewJournalLine::credit(9_999, Money::from(100)));
    assert!(matches!(shop.ledger.post(ghost).await, Err(LedgerError::AccountNotFound(9_999))));
    let bank_now = shop.ledger.account_by_code("1101").await.unwrap().unwrap();
    assert!(bank_now.balance.is_zero(), "A failed entry is rolled back completely");

    let capital = NewJournalEntry::new("manual", "capital-1", "Opening capital", Utc::now())
        .line(NewJournalLine::debit(bank.id, Money::from(5_000_000)))
        .line(NewJournalLine::credit(equity.id, Money::from(5_000_000)).with_memo("Owner"));
    let posted = shop.ledger.post(capital).await.unwrap();
    assert_eq!(posted.lines.len(), 2);
    assert_eq!(posted.lines[1].memo.as_deref(), Some("Owner"));
    let bank_now = shop.ledger.account_by_code("1101").await.unwrap().unwrap();
    let equity_now = shop.ledger.account_by_code("3101").await.unwrap().unwrap();
    assert_eq!(bank_now.balance, Money::from(5_000_000));
    assert_eq!(equity_now.balance, Money::from(5_000_000));
    assert!(shop.ledger.trial_balance().await.unwrap().is_balanced());
    shop.tear_down().await;
}

#[tokio::test]
async fn reversals_mirror_the_original() {
    let shop = Shop::new().await;
    let tee = stocked_product(&shop.db, "TEE", 250_000, 10).await;
    let result = shop.orders.checkout(order_for(Some("sari"), tee.id, 1)).await.unwrap();
    let invoice = &result.invoices[0];
    shop.pay(invoice).await;

    let entries = shop.ledger.entries_for("invoice", invoice.invoice_number.as_str()).await.unwrap();
    assert_eq!(entries.len(), 1);
    let original = &entries[0];
    assert_eq!(original.lines.len(), 2);

    let reversal = shop.ledger.reverse(original.entry.id, "Posted against the wrong bank").await.unwrap();
    assert_eq!(reversal.entry.reverses_entry, Some(original.entry.id));
    assert_eq!(reversal.entry.reference_id, original.entry.reference_id);
    for (line, mirror) in original.lines.iter().zip(reversal.lines.iter()) {
        assert_eq!(line.account_id, mirror.account_id);
        assert_eq!(line.debit, mirror.credit);
        assert_eq!(line.credit, mirror.debit);
    }
    let bank = shop.ledger.account_by_code("1101").await.unwrap().unwrap();
    let revenue = shop.ledger.account_by_code("4101").await.unwrap().unwrap();
    assert!(bank.balance.is_zero());
    assert!(revenue.balance.is_zero());
    assert_eq!(shop.ledger.entries_for("invoice", invoice.invoice_number.as_str()).await.unwrap().len(), 2);

    assert!(matches!(shop.ledger.reverse(9_999, "No such entry").await, Err(LedgerError::EntryNotFound(9_999))));
    let balance = shop.ledger.trial_balance().await.unwrap();
    assert!(balance.is_balanced());
    assert_eq!(balance.total_debit, Money::from(500_000));
    shop.tear_down().await;
}
