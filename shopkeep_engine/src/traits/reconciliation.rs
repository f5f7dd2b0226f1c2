use chrono::{DateTime, Utc};

use crate::traits::{
    data_objects::{SettlementOutcome, SettlementRequest},
    EngineError,
};

/// The single path by which invoices become paid.
#[allow(async_fn_in_trait)]
pub trait Reconciliation {
    /// Finalizes an invoice, exactly once.
    ///
    /// 1. Re-reads the invoice. Paid (or paid late) invoices are acknowledged without side effects.
    /// 2. Decides whether the payment is late from the status read in step 1.
    /// 3. Moves the invoice to `paid`/`paid_late` with an update conditioned on that exact prior status. If the update
    ///    touches no rows, the invoice changed underneath us and the cycle is repeated (a bounded number of times).
    /// 4. On time: posts the payment to the ledger and applies the order-side effects for the invoice type.
    ///    Late: posts the payment and credits the amount to the customer's wallet. The order is left alone.
    async fn settle_invoice(&self, request: SettlementRequest) -> Result<SettlementOutcome, EngineError>;

    /// Pays an invoice from the user's store-credit wallet, debiting the wallet and finalizing the invoice in a single
    /// transaction. Top-up invoices cannot be paid this way.
    async fn pay_with_wallet(
        &self,
        invoice_id: i64,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, EngineError>;
}
