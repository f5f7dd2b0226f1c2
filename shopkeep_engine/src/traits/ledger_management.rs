use chrono::{DateTime, Utc};

use crate::{
    db_types::{Account, NewJournalEntry, PostedEntry},
    traits::{
        data_objects::{AccountPurpose, TrialBalance},
        LedgerError,
    },
};

/// The double-entry ledger. Entries are immutable once posted; corrections are made with reversing entries.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    /// Validates that the entry balances, then persists it and updates the cached account balances.
    async fn post_entry(&self, entry: NewJournalEntry) -> Result<PostedEntry, LedgerError>;

    /// Posts the mirror image of an existing entry.
    async fn reverse_entry(&self, entry_id: i64, reason: &str, now: DateTime<Utc>)
        -> Result<PostedEntry, LedgerError>;

    async fn resolve_account(&self, purpose: AccountPurpose) -> Result<Account, LedgerError>;

    async fn fetch_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    async fn fetch_account_by_code(&self, code: &str) -> Result<Option<Account>, LedgerError>;

    async fn fetch_entries_for_reference(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> Result<Vec<PostedEntry>, LedgerError>;

    async fn trial_balance(&self) -> Result<TrialBalance, LedgerError>;
}
