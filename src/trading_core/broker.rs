//! Brokerage Boundary
//!
//! The [`Broker`] trait is the seam between the execution pipeline and
//! the brokerage REST API: everything the pipeline needs from the broker
//! goes through it, and every call returns a typed [`BrokerError`]
//! instead of raising past the boundary. The live implementation lives in
//! `crate::tradier`; tests script a mock against the same trait.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors from brokerage-facing calls.
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    /// Transport failure, timeout, or an unusable response where a retry
    /// could plausibly succeed. Never retried automatically.
    #[error("brokerage unavailable: {0}")]
    Unavailable(String),

    /// The brokerage declined the request. The raw response body is
    /// preserved for diagnostics. Not retried blindly: resubmission could
    /// duplicate orders.
    #[error("order rejected: {0}")]
    Rejected(String),

    /// The response parsed but an expected field was absent. Reported,
    /// never silently treated as zero.
    #[error("brokerage response missing field: {0}")]
    FieldMissing(&'static str),
}

/// Side of an option order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    BuyToOpen,
    SellToClose,
    BuyToClose,
}

impl OrderSide {
    /// Wire value expected by the brokerage order endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::BuyToOpen => "buy_to_open",
            OrderSide::SellToClose => "sell_to_close",
            OrderSide::BuyToClose => "buy_to_close",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Side of an existing position, derived from its signed quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

/// An open position as reported by the brokerage.
///
/// Enumerated fresh per liquidation pass; the brokerage is the source of
/// truth and nothing here is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    /// Signed quantity: positive = long, negative = short
    pub quantity: f64,
}

impl Position {
    pub fn side(&self) -> PositionSide {
        if self.quantity >= 0.0 {
            PositionSide::Long
        } else {
            PositionSide::Short
        }
    }

    /// Build the direction-correct market order that closes this position.
    ///
    /// Returns `None` for positions that round to a zero close quantity
    /// (fractional dust); a submitted order must carry a strictly positive
    /// integer quantity.
    pub fn close_order(&self) -> Option<OrderRequest> {
        let quantity = self.quantity.abs().round() as u32;
        if quantity == 0 {
            return None;
        }
        let side = match self.side() {
            PositionSide::Long => OrderSide::SellToClose,
            PositionSide::Short => OrderSide::BuyToClose,
        };
        Some(OrderRequest {
            option_symbol: self.symbol.clone(),
            side,
            quantity,
        })
    }
}

/// A market day order to be submitted to the brokerage.
///
/// Constructed, submitted, and discarded; the brokerage assigns the
/// durable order identity.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    /// OCC option symbol (e.g. "SPY260807P00000499")
    pub option_symbol: String,
    pub side: OrderSide,
    /// Number of contracts, always >= 1
    pub quantity: u32,
}

/// Acknowledgement returned by the brokerage for an accepted order
#[derive(Debug, Clone)]
pub struct OrderAck {
    /// Brokerage-assigned order ID
    pub id: i64,
    /// Raw response body, kept for diagnostics
    pub raw: String,
}

/// A fresh option quote. Never cached across signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionQuote {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
}

impl OptionQuote {
    /// Price estimate for sizing: mid of bid/ask when both are present and
    /// positive, else the last trade price, else `fallback`.
    ///
    /// 0-DTE quotes are frequently one-sided or stale near the money, so
    /// the tiers degrade rather than fail. The estimate feeds sizing only,
    /// never correctness-critical math.
    pub fn estimated_price(&self, fallback: f64) -> f64 {
        if let (Some(bid), Some(ask)) = (self.bid, self.ask) {
            if bid > 0.0 && ask > 0.0 {
                return (bid + ask) / 2.0;
            }
        }
        match self.last {
            Some(last) if last > 0.0 => last,
            _ => fallback,
        }
    }
}

/// Brokerage operations the execution pipeline depends on.
///
/// All calls are blocking network I/O with a bounded timeout behind them;
/// a call that exceeds the timeout surfaces [`BrokerError::Unavailable`].
#[async_trait]
pub trait Broker: Send + Sync {
    /// Most recent trade price of the underlying
    async fn underlying_price(&self, symbol: &str) -> Result<f64, BrokerError>;

    /// Quote for a specific option contract
    async fn option_quote(&self, option_symbol: &str) -> Result<OptionQuote, BrokerError>;

    /// Cash available for opening new positions
    async fn cash_available(&self) -> Result<f64, BrokerError>;

    /// All open positions, in brokerage-provided order
    async fn open_positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Submit a market day order
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, BrokerError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory brokerage shared by liquidator and executor tests.

    use super::*;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    pub struct MockBroker {
        pub underlying: Result<f64, BrokerError>,
        pub quote: Result<OptionQuote, BrokerError>,
        pub cash: Result<f64, BrokerError>,
        /// Successive responses to `open_positions`; once exhausted the
        /// book reads as empty.
        pub position_batches: Mutex<VecDeque<Result<Vec<Position>, BrokerError>>>,
        /// Option symbols whose orders the brokerage rejects
        pub reject_symbols: HashSet<String>,
        /// Artificial latency per submitted order
        pub submit_delay: Duration,
        pub orders: Mutex<Vec<OrderRequest>>,
        calls: AtomicUsize,
        next_order_id: AtomicI64,
    }

    impl MockBroker {
        pub fn new() -> Self {
            Self {
                underlying: Ok(500.0),
                quote: Ok(OptionQuote {
                    bid: Some(0.95),
                    ask: Some(1.05),
                    last: Some(1.00),
                }),
                cash: Ok(10_000.0),
                position_batches: Mutex::new(VecDeque::new()),
                reject_symbols: HashSet::new(),
                submit_delay: Duration::ZERO,
                orders: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                next_order_id: AtomicI64::new(1000),
            }
        }

        /// Queue a response for the next `open_positions` call
        pub fn with_positions(mut self, positions: Vec<Position>) -> Self {
            self.position_batches
                .get_mut()
                .unwrap()
                .push_back(Ok(positions));
            self
        }

        pub fn submitted(&self) -> Vec<OrderRequest> {
            self.orders.lock().unwrap().clone()
        }

        /// Total brokerage calls of any kind
        pub fn broker_calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Broker for MockBroker {
        async fn underlying_price(&self, _symbol: &str) -> Result<f64, BrokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.underlying.clone()
        }

        async fn option_quote(&self, _option_symbol: &str) -> Result<OptionQuote, BrokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.quote.clone()
        }

        async fn cash_available(&self) -> Result<f64, BrokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cash.clone()
        }

        async fn open_positions(&self) -> Result<Vec<Position>, BrokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.position_batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, BrokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.submit_delay.is_zero() {
                tokio::time::sleep(self.submit_delay).await;
            }
            self.orders.lock().unwrap().push(order.clone());
            if self.reject_symbols.contains(&order.option_symbol) {
                return Err(BrokerError::Rejected(format!(
                    "order rejected for {}",
                    order.option_symbol
                )));
            }
            let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
            Ok(OrderAck {
                id,
                raw: String::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_side_wire_values() {
        assert_eq!(OrderSide::BuyToOpen.as_str(), "buy_to_open");
        assert_eq!(OrderSide::SellToClose.as_str(), "sell_to_close");
        assert_eq!(OrderSide::BuyToClose.as_str(), "buy_to_close");
    }

    #[test]
    fn test_close_order_long_position() {
        let pos = Position {
            symbol: "SPY260807C00000500".to_string(),
            quantity: 2.0,
        };
        let order = pos.close_order().unwrap();
        assert_eq!(order.side, OrderSide::SellToClose);
        assert_eq!(order.quantity, 2);
        assert_eq!(order.option_symbol, "SPY260807C00000500");
    }

    #[test]
    fn test_close_order_short_position() {
        let pos = Position {
            symbol: "SPY260807P00000499".to_string(),
            quantity: -3.0,
        };
        let order = pos.close_order().unwrap();
        assert_eq!(order.side, OrderSide::BuyToClose);
        assert_eq!(order.quantity, 3);
    }

    #[test]
    fn test_close_order_skips_fractional_dust() {
        let pos = Position {
            symbol: "SPY".to_string(),
            quantity: 0.4,
        };
        assert!(pos.close_order().is_none());
    }

    #[test]
    fn test_estimated_price_prefers_mid() {
        let quote = OptionQuote {
            bid: Some(1.00),
            ask: Some(1.10),
            last: Some(2.00),
        };
        assert!((quote.estimated_price(1.0) - 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_estimated_price_falls_back_to_last_when_one_sided() {
        let quote = OptionQuote {
            bid: Some(0.0),
            ask: Some(1.10),
            last: Some(1.25),
        };
        assert!((quote.estimated_price(1.0) - 1.25).abs() < 1e-9);

        let quote = OptionQuote {
            bid: None,
            ask: Some(1.10),
            last: Some(1.25),
        };
        assert!((quote.estimated_price(1.0) - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_estimated_price_fixed_fallback() {
        let quote = OptionQuote {
            bid: None,
            ask: None,
            last: None,
        };
        assert!((quote.estimated_price(1.0) - 1.0).abs() < 1e-9);

        let quote = OptionQuote {
            bid: None,
            ask: None,
            last: Some(0.0),
        };
        assert!((quote.estimated_price(1.0) - 1.0).abs() < 1e-9);
    }
}
