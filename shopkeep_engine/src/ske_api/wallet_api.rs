use std::fmt::Debug;

use crate::{
    db_types::{Money, Wallet, WalletTransaction},
    traits::{EngineError, WalletManagement},
};

/// Read access to customers' store credit. Wallets are credited by refunds, late payments and top-ups, and debited by
/// wallet payments; none of that happens here.
pub struct WalletApi<B> {
    db: B,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn wallet(&self, user_id: &str) -> Result<Option<Wallet>, EngineError> {
        self.db.fetch_wallet(user_id).await
    }

    /// The user's balance. Users without a wallet have a zero balance.
    pub async fn balance(&self, user_id: &str) -> Result<Money, EngineError> {
        Ok(self.db.fetch_wallet(user_id).await?.map(|w| w.balance).unwrap_or_default())
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<WalletTransaction>, EngineError> {
        self.db.fetch_wallet_history(user_id).await
    }
}
