//! Human-readable identifiers for orders, invoices and payment attempts.
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::{InvoiceNumber, InvoiceType, OrderNumber};

fn random_suffix(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect::<String>().to_uppercase()
}

/// `ORD-240601-7GQ2XK`
pub fn new_order_number(now: DateTime<Utc>) -> OrderNumber {
    OrderNumber(format!("ORD-{}-{}", now.format("%y%m%d"), random_suffix(6)))
}

/// `INV-D-240601-K2M8QZ`. The letter marks the invoice type.
pub fn new_invoice_number(invoice_type: InvoiceType, now: DateTime<Utc>) -> InvoiceNumber {
    let kind = match invoice_type {
        InvoiceType::Full => 'F',
        InvoiceType::Deposit => 'D',
        InvoiceType::Balance => 'B',
        InvoiceType::Topup => 'T',
    };
    InvoiceNumber(format!("INV-{kind}-{}-{}", now.format("%y%m%d"), random_suffix(6)))
}

/// The reference a payment attempt is known by at the gateway: `PAY-<invoice number>-<suffix>`.
pub fn new_merchant_ref(invoice: &InvoiceNumber) -> String {
    format!("PAY-{}-{}", invoice.as_str(), random_suffix(4))
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn reference_formats() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let order = new_order_number(now);
        assert!(order.as_str().starts_with("ORD-240601-"));
        assert_eq!(order.as_str().len(), 17);
        let invoice = new_invoice_number(InvoiceType::Deposit, now);
        assert!(invoice.as_str().starts_with("INV-D-240601-"));
        let merchant_ref = new_merchant_ref(&invoice);
        assert!(merchant_ref.starts_with(&format!("PAY-{invoice}-")));
        assert_ne!(new_order_number(now), new_order_number(now));
    }
}
