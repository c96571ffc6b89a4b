//! Inbound Trading Signals
//!
//! Parsing and validation of the raw signal string delivered by the
//! webhook layer. Invalid values are rejected here, before any brokerage
//! call is made.

use std::fmt;

/// Direction of an inbound trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
}

impl Signal {
    /// Parse a raw webhook value.
    ///
    /// Case-insensitive, surrounding whitespace ignored. Anything other
    /// than "buy" or "sell" is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Signal::Buy),
            "sell" => Some(Signal::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "buy"),
            Signal::Sell => write!(f, "sell"),
        }
    }
}
