//! Pure pricing rules: discount codes and pre-order deposits.
use chrono::{DateTime, Utc};

use crate::{
    db_types::{DepositRule, DiscountCode, DiscountKind, Money, PreOrderConfig},
    traits::PreOrderPolicy,
};

/// Works out how much a discount code takes off `subtotal`, or why the code cannot be used.
pub fn discount_amount(code: &DiscountCode, subtotal: Money, now: DateTime<Utc>) -> Result<Money, String> {
    if !code.active {
        return Err(format!("Code {} is not active", code.code));
    }
    if code.starts_at.map(|t| now < t).unwrap_or(false) {
        return Err(format!("Code {} is not valid yet", code.code));
    }
    if code.ends_at.map(|t| now > t).unwrap_or(false) {
        return Err(format!("Code {} has expired", code.code));
    }
    if code.usage_limit.map(|limit| code.used_count >= limit).unwrap_or(false) {
        return Err(format!("Code {} has been used up", code.code));
    }
    if subtotal < code.min_order {
        return Err(format!("Code {} needs a minimum order of {}", code.code, code.min_order));
    }
    let amount = match code.kind {
        DiscountKind::Percentage => {
            let pct = u32::try_from(code.value.clamp(0, 100)).unwrap_or(0);
            subtotal.percent(pct)
        },
        DiscountKind::Fixed => Money::from(code.value.max(0)),
    };
    let amount = match code.max_discount {
        Some(cap) => amount.min(cap),
        None => amount,
    };
    Ok(amount.min(subtotal))
}

/// The deposit rule in force for a product: its own rule if it has one, otherwise the store-wide percentage.
pub fn deposit_rule(config: Option<&PreOrderConfig>, policy: PreOrderPolicy) -> DepositRule {
    config
        .and_then(|c| c.deposit)
        .unwrap_or(DepositRule::Percentage { percent: policy.deposit_percent })
}

/// Days the customer has to pay the balance once the goods arrive.
pub fn balance_due_days(config: Option<&PreOrderConfig>, policy: PreOrderPolicy) -> i64 {
    config.and_then(|c| c.balance_due_days).filter(|d| *d > 0).unwrap_or(policy.balance_due_days)
}

/// Sizes a pre-order deposit.
///
/// Percentages apply to the discounted subtotal (shipping is settled with the balance) and round down. Fixed
/// deposits are charged per unit. Either way the deposit never exceeds the order total.
pub fn deposit_amount(rule: DepositRule, discounted_subtotal: Money, units: i64, total: Money) -> Money {
    let raw = match rule {
        DepositRule::Percentage { percent } => discounted_subtotal.percent(percent.min(100)),
        DepositRule::FixedPerUnit { amount } => amount * units,
    };
    raw.max(Money::zero()).min(total)
}
