//! Store-credit wallets. Balances only move through [`credit_wallet`] and [`debit_wallet`], each of which writes a
//! wallet transaction with the before and after balances.
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, Wallet, WalletTransaction, WalletTxType},
    traits::EngineError,
};

pub async fn fetch_wallet(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallets WHERE user_id = $1").bind(user_id).fetch_optional(conn).await
}

pub async fn fetch_wallet_history(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallet_transactions WHERE user_id = $1 ORDER BY id")
        .bind(user_id)
        .fetch_all(conn)
        .await
}

pub async fn credit_wallet(
    user_id: &str,
    amount: Money,
    reference: &str,
    description: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, EngineError> {
    if !amount.is_positive() {
        return Err(EngineError::Validation(format!("Wallet credits must be positive, not {amount}")));
    }
    let (balance_after,): (Money,) = sqlx::query_as(
        r#"
            INSERT INTO wallets (user_id, balance, created_at, updated_at) VALUES ($1, $2, $3, $3)
            ON CONFLICT (user_id) DO UPDATE SET balance = balance + excluded.balance, updated_at = excluded.updated_at
            RETURNING balance;
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    let tx = insert_wallet_transaction(
        user_id,
        WalletTxType::Credit,
        amount,
        balance_after,
        reference,
        description,
        now,
        conn,
    )
    .await?;
    debug!("🗃️ Wallet {user_id} credited {amount}. Balance is now {balance_after}");
    Ok(tx)
}

/// Takes `amount` out of the wallet, but never below zero.
pub async fn debit_wallet(
    user_id: &str,
    amount: Money,
    reference: &str,
    description: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, EngineError> {
    if !amount.is_positive() {
        return Err(EngineError::Validation(format!("Wallet debits must be positive, not {amount}")));
    }
    let updated: Option<(Money,)> = sqlx::query_as(
        r#"
            UPDATE wallets SET balance = balance - $1, updated_at = $2
            WHERE user_id = $3 AND balance >= $1
            RETURNING balance;
        "#,
    )
    .bind(amount)
    .bind(now)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some((balance_after,)) = updated else {
        let balance = fetch_wallet(user_id, conn).await?.map(|w| w.balance).unwrap_or_default();
        return Err(EngineError::InsufficientWalletFunds { user_id: user_id.to_string(), balance, requested: amount });
    };
    let tx = insert_wallet_transaction(
        user_id,
        WalletTxType::Debit,
        amount,
        balance_after,
        reference,
        description,
        now,
        conn,
    )
    .await?;
    debug!("🗃️ Wallet {user_id} debited {amount}. Balance is now {balance_after}");
    Ok(tx)
}

#[allow(clippy::too_many_arguments)]
async fn insert_wallet_transaction(
    user_id: &str,
    tx_type: WalletTxType,
    amount: Money,
    balance_after: Money,
    reference: &str,
    description: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, sqlx::Error> {
    let balance_before = match tx_type {
        WalletTxType::Credit => balance_after - amount,
        WalletTxType::Debit => balance_after + amount,
    };
    sqlx::query_as(
        r#"
            INSERT INTO wallet_transactions
                (user_id, tx_type, amount, balance_before, balance_after, reference, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(tx_type)
    .bind(amount)
    .bind(balance_before)
    .bind(balance_after)
    .bind(reference)
    .bind(description)
    .bind(now)
    .fetch_one(conn)
    .await
}
