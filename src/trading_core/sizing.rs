//! Order Sizing
//!
//! Converts available cash and an estimated contract price into a safe
//! order quantity. A result of zero is a valid "insufficient funds"
//! outcome, not an error.

/// One option contract controls 100 underlying shares
pub const OPTION_MULTIPLIER: f64 = 100.0;

/// Fixed sizing estimate used when no usable quote exists for the
/// contract. Feeds sizing only.
pub const FALLBACK_CONTRACT_PRICE: f64 = 1.00;

/// Number of contracts to buy with `cash` at `contract_price` per share.
///
/// quantity = floor((cash * safety_fraction) / (contract_price * 100)),
/// clamped to `max_contracts`. `safety_fraction` keeps a reserve margin so
/// a single order never commits the full balance; `max_contracts` bounds
/// single-order blast radius.
pub fn compute_quantity(
    cash: f64,
    contract_price: f64,
    safety_fraction: f64,
    max_contracts: u32,
) -> u32 {
    if !cash.is_finite() || cash <= 0.0 {
        return 0;
    }
    if !contract_price.is_finite() || contract_price <= 0.0 {
        return 0;
    }

    let per_contract = contract_price * OPTION_MULTIPLIER;
    let quantity = (cash * safety_fraction / per_contract).floor();
    if quantity <= 0.0 {
        return 0;
    }
    (quantity as u64).min(u64::from(max_contracts)) as u32
}
