use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Account, NewJournalEntry, PostedEntry},
    traits::{AccountPurpose, LedgerError, LedgerManagement, TrialBalance},
};

/// The double-entry books. Entries are immutable once posted; mistakes are corrected with [`LedgerApi::reverse`].
pub struct LedgerApi<B> {
    db: B,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Posts a manual journal entry. Unbalanced entries are rejected and nothing is written.
    pub async fn post(&self, entry: NewJournalEntry) -> Result<PostedEntry, LedgerError> {
        let posted = self.db.post_entry(entry).await?;
        info!("📒️ Posted journal entry #{}: {}", posted.entry.id, posted.entry.description);
        Ok(posted)
    }

    /// Posts the mirror image of entry `entry_id`.
    pub async fn reverse(&self, entry_id: i64, reason: &str) -> Result<PostedEntry, LedgerError> {
        let posted = self.db.reverse_entry(entry_id, reason, Utc::now()).await?;
        info!("📒️ Journal entry #{entry_id} reversed by #{}. {reason}", posted.entry.id);
        Ok(posted)
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.db.fetch_accounts().await
    }

    pub async fn account_by_code(&self, code: &str) -> Result<Option<Account>, LedgerError> {
        self.db.fetch_account_by_code(code).await
    }

    pub async fn resolve(&self, purpose: AccountPurpose) -> Result<Account, LedgerError> {
        self.db.resolve_account(purpose).await
    }

    pub async fn entries_for(&self, reference_type: &str, reference_id: &str) -> Result<Vec<PostedEntry>, LedgerError> {
        self.db.fetch_entries_for_reference(reference_type, reference_id).await
    }

    pub async fn trial_balance(&self) -> Result<TrialBalance, LedgerError> {
        let balance = self.db.trial_balance().await?;
        if !balance.is_balanced() {
            error!(
                "📒️ The books do not balance! Debits: {}, credits: {}",
                balance.total_debit, balance.total_credit
            );
        }
        Ok(balance)
    }
}
