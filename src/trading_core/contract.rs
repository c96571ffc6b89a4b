//! 0-DTE Contract Selection
//!
//! Pure derivation of the target option contract from signal direction,
//! the current underlying price, and today's date. No brokerage calls and
//! no existence check: if the derived contract is illiquid or unlisted,
//! that surfaces at order submission, not here.

use chrono::{NaiveDate, Utc};
use chrono_tz::America::New_York;

use super::signal::Signal;

/// The only underlying this strategy trades
pub const UNDERLYING: &str = "SPY";

/// Call or Put
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    /// Single-letter code used in the option symbol
    pub fn letter(&self) -> char {
        match self {
            OptionRight::Call => 'C',
            OptionRight::Put => 'P',
        }
    }
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionRight::Call => write!(f, "call"),
            OptionRight::Put => write!(f, "put"),
        }
    }
}

/// A fully determined option contract, recomputed per invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionContract {
    pub underlying: &'static str,
    /// Expiry date; always today for the 0-DTE strategy
    pub expiry: NaiveDate,
    pub right: OptionRight,
    /// Whole-dollar strike
    pub strike: i64,
}

impl OptionContract {
    /// Render the brokerage option symbol:
    /// underlying + `YYMMDD` expiry + right letter + 8-digit zero-padded
    /// strike, e.g. `SPY260807P00000499`.
    pub fn occ_symbol(&self) -> String {
        format!(
            "{}{}{}{:08}",
            self.underlying,
            self.expiry.format("%y%m%d"),
            self.right.letter(),
            self.strike
        )
    }
}

/// Pick the contract to enter for a signal.
///
/// Sell => one-point out-of-the-money put (strike = round(price) - 1),
/// a mild directional hedge bias. Buy => at-the-money call
/// (strike = round(price)). Rounding is half-away-from-zero
/// (`f64::round`): 500.5 rounds to 501, 499.5 rounds to 500.
pub fn select_contract(signal: Signal, underlying_price: f64, today: NaiveDate) -> OptionContract {
    let (right, strike) = match signal {
        Signal::Buy => (OptionRight::Call, underlying_price.round() as i64),
        Signal::Sell => (OptionRight::Put, underlying_price.round() as i64 - 1),
    };
    OptionContract {
        underlying: UNDERLYING,
        expiry: today,
        right,
        strike,
    }
}

/// Today's date on the exchange calendar (America/New_York).
///
/// 0-DTE contracts expire on the exchange's trading day, which near
/// midnight UTC is not the UTC date.
pub fn exchange_today() -> NaiveDate {
    Utc::now().with_timezone(&New_York).date_naive()
}
