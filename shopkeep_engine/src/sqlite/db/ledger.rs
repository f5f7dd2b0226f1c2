//! The double-entry ledger.
//!
//! Entries are validated before anything is written, and every line updates its account's cached balance in the
//! same transaction as the entry itself.
use chrono::{DateTime, Utc};
use log::{debug, error, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{
        Account,
        Invoice,
        JournalEntry,
        JournalLine,
        Money,
        NewJournalEntry,
        NewJournalLine,
        PaymentMethod,
        PostedEntry,
    },
    traits::{AccountPurpose, LedgerError, TrialBalance},
};

/// Checks that an entry can be posted: it has at least one non-zero line, no line is negative or two-sided, and
/// debits equal credits.
pub fn validate_entry(entry: &NewJournalEntry) -> Result<(), LedgerError> {
    if entry.lines.iter().any(|l| l.debit.is_negative() || l.credit.is_negative()) {
        return Err(LedgerError::NegativeAmount);
    }
    if entry.lines.iter().any(|l| l.debit.is_positive() && l.credit.is_positive()) {
        return Err(LedgerError::NegativeAmount);
    }
    let debit = entry.total_debit();
    let credit = entry.total_credit();
    if debit.is_zero() && credit.is_zero() {
        return Err(LedgerError::EmptyEntry);
    }
    if debit != credit {
        return Err(LedgerError::Unbalanced { debit, credit });
    }
    Ok(())
}

pub async fn post_entry(entry: NewJournalEntry, conn: &mut SqliteConnection) -> Result<PostedEntry, LedgerError> {
    if let Err(e) = validate_entry(&entry) {
        error!("📒️ Refusing to post journal entry for {} {}: {e}", entry.reference_type, entry.reference_id);
        return Err(e);
    }
    let journal: JournalEntry = sqlx::query_as(
        r#"
            INSERT INTO journal_entries
                (entry_date, description, reference_id, reference_type, reverses_entry, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(entry.entry_date)
    .bind(&entry.description)
    .bind(&entry.reference_id)
    .bind(&entry.reference_type)
    .bind(entry.reverses_entry)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    let mut lines = Vec::with_capacity(entry.lines.len());
    for line in entry.lines.into_iter().filter(|l| l.debit.is_positive() || l.credit.is_positive()) {
        let account = fetch_account(line.account_id, &mut *conn)
            .await?
            .ok_or(LedgerError::AccountNotFound(line.account_id))?;
        let change = account.account_type.balance_change(line.debit, line.credit);
        sqlx::query("UPDATE accounts SET balance = balance + $1, updated_at = $2 WHERE id = $3")
            .bind(change)
            .bind(Utc::now())
            .bind(account.id)
            .execute(&mut *conn)
            .await?;
        let line: JournalLine = sqlx::query_as(
            r#"
                INSERT INTO journal_lines (entry_id, account_id, debit, credit, memo)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *;
            "#,
        )
        .bind(journal.id)
        .bind(line.account_id)
        .bind(line.debit)
        .bind(line.credit)
        .bind(line.memo)
        .fetch_one(&mut *conn)
        .await?;
        trace!("📒️ Entry {} line: account {} Dr {} Cr {}", journal.id, account.code, line.debit, line.credit);
        lines.push(line);
    }
    debug!("📒️ Posted journal entry {} [{}] {}", journal.id, journal.reference_id, journal.description);
    Ok(PostedEntry { entry: journal, lines })
}

pub async fn fetch_entry(entry_id: i64, conn: &mut SqliteConnection) -> Result<Option<PostedEntry>, LedgerError> {
    let entry: Option<JournalEntry> =
        sqlx::query_as("SELECT * FROM journal_entries WHERE id = $1").bind(entry_id).fetch_optional(&mut *conn).await?;
    match entry {
        Some(entry) => {
            let lines = fetch_lines(entry.id, conn).await?;
            Ok(Some(PostedEntry { entry, lines }))
        },
        None => Ok(None),
    }
}

async fn fetch_lines(entry_id: i64, conn: &mut SqliteConnection) -> Result<Vec<JournalLine>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM journal_lines WHERE entry_id = $1 ORDER BY id").bind(entry_id).fetch_all(conn).await
}

/// Posts the mirror image of an entry: every debit becomes a credit on the same account and vice versa.
pub async fn reverse_entry(
    entry_id: i64,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PostedEntry, LedgerError> {
    let original = fetch_entry(entry_id, &mut *conn).await?.ok_or(LedgerError::EntryNotFound(entry_id))?;
    let mut reversal = NewJournalEntry::new(
        original.entry.reference_type.clone(),
        original.entry.reference_id.clone(),
        format!("Reversal of entry {entry_id}: {reason}"),
        now,
    );
    reversal.reverses_entry = Some(entry_id);
    for line in &original.lines {
        reversal = reversal.line(NewJournalLine {
            account_id: line.account_id,
            debit: line.credit,
            credit: line.debit,
            memo: line.memo.clone(),
        });
    }
    post_entry(reversal, conn).await
}

pub async fn fetch_entries_for_reference(
    reference_type: &str,
    reference_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<PostedEntry>, LedgerError> {
    let entries: Vec<JournalEntry> =
        sqlx::query_as("SELECT * FROM journal_entries WHERE reference_type = $1 AND reference_id = $2 ORDER BY id")
            .bind(reference_type)
            .bind(reference_id)
            .fetch_all(&mut *conn)
            .await?;
    let mut result = Vec::with_capacity(entries.len());
    for entry in entries {
        let lines = fetch_lines(entry.id, &mut *conn).await?;
        result.push(PostedEntry { entry, lines });
    }
    Ok(result)
}

pub async fn fetch_account(id: i64, conn: &mut SqliteConnection) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM accounts WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_account_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM accounts WHERE code = $1").bind(code).fetch_optional(conn).await
}

pub async fn fetch_accounts(conn: &mut SqliteConnection) -> Result<Vec<Account>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM accounts ORDER BY code").fetch_all(conn).await
}

/// Finds the account for a purpose: the first mapping key that exists wins, then the lowest-coded account of the
/// purpose's type. Fails loudly when neither matches.
pub async fn resolve_account(purpose: AccountPurpose, conn: &mut SqliteConnection) -> Result<Account, LedgerError> {
    for key in purpose.mapping_keys() {
        let account: Option<Account> = sqlx::query_as("SELECT * FROM accounts WHERE mapping_key = $1")
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(account) = account {
            return Ok(account);
        }
    }
    let sql = "SELECT * FROM accounts WHERE account_type = $1 ORDER BY code LIMIT 1";
    let account: Option<Account> = sqlx::query_as(sql)
        .bind(purpose.fallback_type())
        .fetch_optional(&mut *conn)
        .await?;
    match account {
        Some(account) => {
            let (code, name) = (&account.code, &account.name);
            debug!("📒️ No mapping key for {purpose:?}. Falling back to account {code} ({name})");
            Ok(account)
        },
        None => {
            error!("📒️ No account could be resolved for {purpose:?}. The chart of accounts is incomplete.");
            Err(LedgerError::AccountNotResolved(purpose))
        },
    }
}

pub async fn trial_balance(conn: &mut SqliteConnection) -> Result<TrialBalance, LedgerError> {
    let (total_debit, total_credit): (i64, i64) =
        sqlx::query_as("SELECT COALESCE(SUM(debit), 0), COALESCE(SUM(credit), 0) FROM journal_lines")
            .fetch_one(&mut *conn)
            .await?;
    let accounts = fetch_accounts(conn).await?;
    Ok(TrialBalance { total_debit: Money::from(total_debit), total_credit: Money::from(total_credit), accounts })
}

/// Posts the receipt of money for an invoice.
///
/// The debit side follows where the money came from (bank, cash, or the customer's wallet). The credit side follows
/// the invoice type: deposits and top-ups are liabilities until earned, full and balance payments are revenue.
pub async fn record_payment(
    invoice: &Invoice,
    method: &PaymentMethod,
    gateway_ref: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PostedEntry>, LedgerError> {
    if invoice.amount.is_zero() {
        debug!("📒️ Invoice {} is for zero. Nothing to post.", invoice.invoice_number);
        return Ok(None);
    }
    let debit = resolve_account(AccountPurpose::for_funding(method.funding_source()), &mut *conn).await?;
    let credit = resolve_account(AccountPurpose::for_invoice_credit(invoice.invoice_type), &mut *conn).await?;
    let description = match gateway_ref {
        Some(r) => {
            format!("Payment for {} invoice {} via {method} ({r})", invoice.invoice_type, invoice.invoice_number)
        },
        None => format!("Payment for {} invoice {} via {method}", invoice.invoice_type, invoice.invoice_number),
    };
    let entry = NewJournalEntry::new("invoice", invoice.invoice_number.as_str(), description, now)
        .line(NewJournalLine::debit(debit.id, invoice.amount))
        .line(NewJournalLine::credit(credit.id, invoice.amount));
    let posted = post_entry(entry, conn).await?;
    Ok(Some(posted))
}

/// Posts an entry whose lines are given by purpose as `(purpose, debit, credit)`. Zero lines are dropped, and nothing
/// is posted if no lines remain.
pub async fn post_by_purpose(
    reference_type: &str,
    reference_id: &str,
    description: &str,
    lines: &[(AccountPurpose, Money, Money)],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PostedEntry>, LedgerError> {
    let mut entry = NewJournalEntry::new(reference_type, reference_id, description, now);
    for (purpose, debit, credit) in lines.iter().filter(|(_, d, c)| d.is_positive() || c.is_positive()) {
        let account = resolve_account(*purpose, &mut *conn).await?;
        entry = entry.line(NewJournalLine { account_id: account.id, debit: *debit, credit: *credit, memo: None });
    }
    if entry.lines.is_empty() {
        return Ok(None);
    }
    post_entry(entry, conn).await.map(Some)
}

/// Posts a two-line entry moving `amount` from the `credit` purpose to the `debit` purpose. Nothing is posted when the
/// amount is zero, or when both purposes resolve to the same account.
pub async fn post_transfer(
    reference_type: &str,
    reference_id: &str,
    description: &str,
    (debit, credit): (AccountPurpose, AccountPurpose),
    amount: Money,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PostedEntry>, LedgerError> {
    if amount.is_zero() {
        return Ok(None);
    }
    let debit_account = resolve_account(debit, &mut *conn).await?;
    let credit_account = resolve_account(credit, &mut *conn).await?;
    if debit_account.id == credit_account.id {
        trace!("📒️ {debit:?} and {credit:?} share account {}. No entry needed.", debit_account.code);
        return Ok(None);
    }
    let entry = NewJournalEntry::new(reference_type, reference_id, description, now)
        .line(NewJournalLine::debit(debit_account.id, amount))
        .line(NewJournalLine::credit(credit_account.id, amount));
    post_entry(entry, conn).await.map(Some)
}
