use crate::{
    db_types::{Wallet, WalletTransaction},
    traits::EngineError,
};

/// Read access to store-credit wallets. Wallets only change as a side effect of settlements, cancellations and refunds.
#[allow(async_fn_in_trait)]
pub trait WalletManagement {
    /// Returns the wallet for the user, or `None` if the user has never held store credit.
    async fn fetch_wallet(&self, user_id: &str) -> Result<Option<Wallet>, EngineError>;

    async fn fetch_wallet_history(&self, user_id: &str) -> Result<Vec<WalletTransaction>, EngineError>;
}
