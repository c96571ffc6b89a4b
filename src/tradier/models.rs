//! Tradier API Data Models
//!
//! Response types for the Tradier REST API, plus the normalization of its
//! inconsistent shapes. Tradier collapses single-element collections into
//! bare objects, reports an empty position book as the literal string
//! "null", and splits cash across two balance fields depending on account
//! type. All of that variance is absorbed here so the rest of the system
//! only ever sees `Vec<Position>` and plain numbers.

use serde::Deserialize;

use crate::trading_core::broker::Position;

/// A value Tradier serializes as either a bare object or an array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

// ============================================================================
// Quotes
// ============================================================================

/// Response envelope for `GET /markets/quotes`
#[derive(Debug, Deserialize)]
pub struct QuotesEnvelope {
    #[serde(default)]
    pub quotes: Option<QuotesBody>,
}

#[derive(Debug, Deserialize)]
pub struct QuotesBody {
    #[serde(default)]
    pub quote: Option<OneOrMany<TradierQuote>>,
}

/// A single quote row
#[derive(Debug, Deserialize, Clone)]
pub struct TradierQuote {
    pub symbol: String,
    /// Most recent trade price
    #[serde(default)]
    pub last: Option<f64>,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
}

impl QuotesEnvelope {
    /// Flatten the envelope, tolerating the bare-object single-quote shape
    pub fn into_quotes(self) -> Vec<TradierQuote> {
        self.quotes
            .and_then(|body| body.quote)
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
    }
}

// ============================================================================
// Balances
// ============================================================================

/// Response envelope for `GET /accounts/{id}/balances`
#[derive(Debug, Deserialize)]
pub struct BalancesEnvelope {
    #[serde(default)]
    pub balances: Option<Balances>,
}

#[derive(Debug, Deserialize)]
pub struct Balances {
    /// Present on all account types
    #[serde(default)]
    pub total_cash: Option<f64>,
    /// Cash-account detail block
    #[serde(default)]
    pub cash: Option<CashBalances>,
}

#[derive(Debug, Deserialize)]
pub struct CashBalances {
    #[serde(default)]
    pub cash_available: Option<f64>,
}

impl BalancesEnvelope {
    /// Cash available for new orders: `cash.cash_available` when the
    /// account reports it, else `total_cash`. `None` means neither field
    /// was present, which callers must report rather than read as zero.
    pub fn available_cash(&self) -> Option<f64> {
        let balances = self.balances.as_ref()?;
        balances
            .cash
            .as_ref()
            .and_then(|c| c.cash_available)
            .or(balances.total_cash)
    }
}

// ============================================================================
// Positions
// ============================================================================

/// Response envelope for `GET /accounts/{id}/positions`
#[derive(Debug, Deserialize)]
pub struct PositionsEnvelope {
    #[serde(default)]
    pub positions: Option<PositionsBody>,
}

/// The `positions` value: an object wrapping one-or-many rows, or the
/// literal string "null" Tradier returns for an empty book
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PositionsBody {
    Wrapped {
        #[serde(default)]
        position: Option<OneOrMany<TradierPosition>>,
    },
    Sentinel(String),
}

/// A single position row
#[derive(Debug, Deserialize, Clone)]
pub struct TradierPosition {
    pub symbol: String,
    /// Signed: positive = long, negative = short
    pub quantity: f64,
    #[serde(default)]
    pub cost_basis: Option<f64>,
    #[serde(default)]
    pub id: Option<i64>,
}

impl PositionsEnvelope {
    /// Normalize every observed response shape into a position list.
    ///
    /// Absent key, JSON null, the "null" string sentinel, and an empty
    /// wrapper all become an empty list; a bare single object becomes a
    /// one-element list. Zero-quantity rows are dropped (nothing to
    /// close). Brokerage order is preserved.
    pub fn into_positions(self) -> Vec<Position> {
        let rows = match self.positions {
            Some(PositionsBody::Wrapped {
                position: Some(rows),
            }) => rows.into_vec(),
            _ => Vec::new(),
        };
        rows.into_iter()
            .filter(|row| row.quantity != 0.0)
            .map(|row| Position {
                symbol: row.symbol,
                quantity: row.quantity,
            })
            .collect()
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Response envelope for `POST /accounts/{id}/orders`
#[derive(Debug, Deserialize)]
pub struct OrderEnvelope {
    #[serde(default)]
    pub order: Option<OrderBody>,
}

#[derive(Debug, Deserialize)]
pub struct OrderBody {
    /// Brokerage-assigned order ID
    pub id: i64,
    #[serde(default)]
    pub status: Option<String>,
}

// ============================================================================
// Symbol helpers
// ============================================================================

/// Underlying ticker embedded in an OCC option symbol (the leading
/// alphabetic prefix). A plain equity symbol maps to itself.
pub fn occ_underlying(symbol: &str) -> &str {
    let end = symbol
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(symbol.len());
    &symbol[..end]
}
