mod pricing;
mod references;
mod signature;

pub use pricing::{balance_due_days, deposit_amount, deposit_rule, discount_amount};
pub use references::{new_invoice_number, new_merchant_ref, new_order_number};
pub use signature::{calculate_hmac, verify_hmac};
