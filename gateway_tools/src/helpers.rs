use shopkeep_common::Money;

use crate::PayGateError;

/// The gateway expresses amounts as decimal strings ("150000.00"). Rupiah have no minor unit in practice, so a
/// non-zero fraction is rejected rather than rounded.
pub fn parse_gateway_amount(amount: &str) -> Result<Money, PayGateError> {
    let amount = amount.trim();
    let mut parts = amount.split('.');
    let whole = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PayGateError::InvalidAmount(amount.to_string()))?
        .parse::<i64>()
        .map_err(|e| PayGateError::InvalidAmount(format!("Invalid amount: {amount}. {e}.")))?;
    match parts.next() {
        None => {},
        Some(fraction) if !fraction.is_empty() && fraction.chars().all(|c| c == '0') => {},
        Some(_) => return Err(PayGateError::InvalidAmount(format!("{amount} has a fractional part"))),
    }
    if parts.next().is_some() {
        return Err(PayGateError::InvalidAmount(amount.to_string()));
    }
    Ok(Money::from(whole))
}

pub fn gateway_amount(amount: Money) -> String {
    format!("{}.00", amount.value())
}
