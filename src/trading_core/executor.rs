//! Signal Execution Orchestrator
//!
//! Runs the per-signal pipeline: validate the signal, liquidate whatever
//! is open, select the 0-DTE contract, size the entry from cash, submit
//! the order. Each stage either advances or produces a classified
//! failure; nothing is retried across stages, so a signal is processed at
//! most once end-to-end (re-delivery policy belongs to the webhook
//! sender).
//!
//! Overlapping signals against the same account would race on cash and
//! position state, so runs are serialized by a per-account gate: a second
//! signal waits a bounded time for the gate, then fails `Busy` without
//! touching the brokerage.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;

use super::broker::{Broker, BrokerError, OrderRequest, OrderSide};
use super::contract::{exchange_today, select_contract, UNDERLYING};
use super::liquidator::{self, CloseOutcome};
use super::signal::Signal;
use super::sizing::{compute_quantity, FALLBACK_CONTRACT_PRICE};

/// Classification of a failed signal, assigned exactly once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed inbound signal; no brokerage call was made
    InvalidSignal,
    /// Another signal held the account gate past the bounded wait
    Busy,
    /// Transport failure or timeout against the brokerage
    Unavailable,
    /// The brokerage declined a request
    Rejected,
    /// Sizing produced a zero quantity
    InsufficientFunds,
    /// A brokerage response was missing an expected field
    FieldMissing,
}

impl From<&BrokerError> for FailureKind {
    fn from(e: &BrokerError) -> Self {
        match e {
            BrokerError::Unavailable(_) => FailureKind::Unavailable,
            BrokerError::Rejected(_) => FailureKind::Rejected,
            BrokerError::FieldMissing(_) => FailureKind::FieldMissing,
        }
    }
}

/// Final outcome of one signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The entry order was submitted but liquidation was only partial
    PartialFailure,
    Failure(FailureKind),
}

/// What the caller of [`SignalExecutor::process_signal`] gets back.
/// Not persisted; the webhook layer renders it into the HTTP response.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub outcome: Outcome,
    pub message: String,
    /// Brokerage-assigned order ID of the entry order, when one was placed
    pub order_id: Option<i64>,
}

impl ExecutionResult {
    fn success(message: String, order_id: i64) -> Self {
        Self {
            outcome: Outcome::Success,
            message,
            order_id: Some(order_id),
        }
    }

    fn partial(message: String, order_id: i64) -> Self {
        Self {
            outcome: Outcome::PartialFailure,
            message,
            order_id: Some(order_id),
        }
    }

    fn failure(kind: FailureKind, message: String) -> Self {
        Self {
            outcome: Outcome::Failure(kind),
            message,
            order_id: None,
        }
    }
}

/// Liveness report; performs no brokerage call
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HealthStatus {
    pub configured: bool,
}

/// Orchestrates the liquidate-then-enter pipeline for inbound signals.
///
/// Owns no state beyond the injected configuration and the per-account
/// serialization gate; every run reads account truth fresh from the
/// brokerage.
pub struct SignalExecutor {
    broker: Arc<dyn Broker>,
    config: Config,
    gate: Mutex<()>,
}

impl SignalExecutor {
    pub fn new(broker: Arc<dyn Broker>, config: Config) -> Self {
        Self {
            broker,
            config,
            gate: Mutex::new(()),
        }
    }

    /// Whether brokerage credentials are present. No brokerage call.
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            configured: !self.config.access_token.is_empty()
                && !self.config.account_id.is_empty(),
        }
    }

    /// Process one raw signal end-to-end and classify the outcome.
    pub async fn process_signal(&self, raw: &str) -> ExecutionResult {
        let Some(signal) = Signal::parse(raw) else {
            warn!("Rejected invalid signal: {:?}", raw);
            return ExecutionResult::failure(
                FailureKind::InvalidSignal,
                format!("invalid signal: {:?}", raw.trim()),
            );
        };

        // At most one liquidate-then-enter span per account at a time.
        let _gate = match timeout(self.config.busy_timeout, self.gate.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                warn!("{} signal rejected: another signal is in flight", signal);
                return ExecutionResult::failure(
                    FailureKind::Busy,
                    "another signal is being processed".to_string(),
                );
            }
        };

        info!("Processing {} signal", signal);
        self.run(signal).await
    }

    async fn run(&self, signal: Signal) -> ExecutionResult {
        // Liquidating
        let close =
            match liquidator::close_all(self.broker.as_ref(), self.config.settle_delay).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    return ExecutionResult::failure(
                        (&e).into(),
                        format!("could not list open positions: {e}"),
                    )
                }
            };

        let mut warning = None;
        match close {
            CloseOutcome::NoPositions => {}
            CloseOutcome::AllClosed(n) => info!("Closed {} position(s)", n),
            CloseOutcome::AllFailed(n) => {
                return ExecutionResult::failure(
                    FailureKind::Rejected,
                    format!("could not close existing positions ({n} close orders failed)"),
                );
            }
            CloseOutcome::PartiallyClosed { closed, total } => {
                warn!("Only {}/{} positions closed", closed, total);
                // A stuck position in the same contract family must not
                // have a new one stacked on top of it.
                match self.broker.open_positions().await {
                    Ok(remaining) => {
                        if remaining.iter().any(|p| p.symbol.starts_with(UNDERLYING)) {
                            return ExecutionResult::failure(
                                FailureKind::Rejected,
                                format!(
                                    "aborting entry: {closed} of {total} positions closed and a {UNDERLYING} position is still open"
                                ),
                            );
                        }
                    }
                    Err(e) => {
                        return ExecutionResult::failure(
                            (&e).into(),
                            format!(
                                "aborting entry: could not verify remaining positions after partial close: {e}"
                            ),
                        );
                    }
                }
                warning = Some(format!("{closed} of {total} positions closed"));
            }
        }

        // Selecting
        let underlying_price = match self.broker.underlying_price(UNDERLYING).await {
            Ok(price) => price,
            Err(e) => {
                return ExecutionResult::failure(
                    (&e).into(),
                    format!("could not fetch {UNDERLYING} quote: {e}"),
                )
            }
        };
        let contract = select_contract(signal, underlying_price, exchange_today());
        let option_symbol = contract.occ_symbol();
        info!(
            "Selected {} ({} strike {} expiring {})",
            option_symbol, contract.right, contract.strike, contract.expiry
        );

        // Sizing
        let cash = match self.broker.cash_available().await {
            Ok(cash) => cash,
            Err(e) => {
                return ExecutionResult::failure(
                    (&e).into(),
                    format!("could not fetch account balance: {e}"),
                )
            }
        };
        let estimate = match self.broker.option_quote(&option_symbol).await {
            Ok(quote) => quote.estimated_price(FALLBACK_CONTRACT_PRICE),
            Err(e) => {
                return ExecutionResult::failure(
                    (&e).into(),
                    format!("could not fetch quote for {option_symbol}: {e}"),
                )
            }
        };
        let quantity = compute_quantity(
            cash,
            estimate,
            self.config.safety_fraction,
            self.config.max_contracts,
        );
        if quantity == 0 {
            info!(
                "Insufficient funds: {:.2} cash at ~{:.2} per contract",
                cash, estimate
            );
            return ExecutionResult::failure(
                FailureKind::InsufficientFunds,
                format!("insufficient funds: {cash:.2} available, contract estimate {estimate:.2}"),
            );
        }
        debug!(
            "Sizing: {:.2} cash, {:.2} estimate -> {} contract(s)",
            cash, estimate, quantity
        );

        // Submitting
        let order = OrderRequest {
            option_symbol: option_symbol.clone(),
            side: OrderSide::BuyToOpen,
            quantity,
        };
        match self.broker.submit_order(&order).await {
            Ok(ack) => {
                info!(
                    "Entry order accepted: {} {} x {} (ID {})",
                    order.side, quantity, option_symbol, ack.id
                );
                match warning {
                    Some(w) => ExecutionResult::partial(
                        format!("opened {quantity} x {option_symbol}; warning: {w}"),
                        ack.id,
                    ),
                    None => ExecutionResult::success(
                        format!("opened {quantity} x {option_symbol}"),
                        ack.id,
                    ),
                }
            }
            Err(e) => {
                ExecutionResult::failure((&e).into(), format!("entry order failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading_core::broker::testing::MockBroker;
    use crate::trading_core::broker::Position;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            base_url: "http://localhost".to_string(),
            access_token: "test-token".to_string(),
            account_id: "TEST123".to_string(),
            safety_fraction: 0.9,
            max_contracts: 5,
            settle_delay: Duration::ZERO,
            http_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(1),
        }
    }

    fn pos(symbol: &str, quantity: f64) -> Position {
        Position {
            symbol: symbol.to_string(),
            quantity,
        }
    }

    fn todays_symbol(tail: &str) -> String {
        format!("SPY{}{}", exchange_today().format("%y%m%d"), tail)
    }

    #[tokio::test]
    async fn test_invalid_signal_makes_no_brokerage_calls() {
        let broker = Arc::new(MockBroker::new());
        let executor = SignalExecutor::new(broker.clone(), test_config());

        let result = executor.process_signal("hold").await;
        assert_eq!(
            result.outcome,
            Outcome::Failure(FailureKind::InvalidSignal)
        );
        assert_eq!(result.order_id, None);
        assert_eq!(broker.broker_calls(), 0);
    }

    #[tokio::test]
    async fn test_sell_signal_end_to_end() {
        let broker = Arc::new(
            MockBroker::new().with_positions(vec![pos(&todays_symbol("C00000500"), 1.0)]),
        );
        let executor = SignalExecutor::new(broker.clone(), test_config());

        let result = executor.process_signal("SELL").await;
        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.order_id.is_some());

        let orders = broker.submitted();
        assert_eq!(orders.len(), 2);
        // Close of the existing long call
        assert_eq!(orders[0].side, OrderSide::SellToClose);
        assert_eq!(orders[0].quantity, 1);
        // Entry into the one-point-OTM put, sized from 10k cash at ~1.00
        // (floor(9000 / 100) = 90, clamped to the 5-contract cap)
        assert_eq!(orders[1].side, OrderSide::BuyToOpen);
        assert_eq!(orders[1].option_symbol, todays_symbol("P00000499"));
        assert_eq!(orders[1].quantity, 5);
    }

    #[tokio::test]
    async fn test_insufficient_funds_submits_no_entry() {
        let mut broker = MockBroker::new();
        broker.cash = Ok(50.0);
        let broker = Arc::new(broker);
        let executor = SignalExecutor::new(broker.clone(), test_config());

        let result = executor.process_signal("buy").await;
        assert_eq!(
            result.outcome,
            Outcome::Failure(FailureKind::InsufficientFunds)
        );
        assert!(broker.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_all_failed_liquidation_aborts_entry() {
        let mut broker =
            MockBroker::new().with_positions(vec![pos(&todays_symbol("C00000500"), 1.0)]);
        broker.reject_symbols.insert(todays_symbol("C00000500"));
        let broker = Arc::new(broker);
        let executor = SignalExecutor::new(broker.clone(), test_config());

        let result = executor.process_signal("sell").await;
        assert_eq!(result.outcome, Outcome::Failure(FailureKind::Rejected));
        assert!(result.message.contains("could not close existing positions"));
        // Only the failed close was submitted, never an entry.
        assert_eq!(broker.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_close_with_stuck_family_position_aborts_entry() {
        let stuck = todays_symbol("C00000501");
        let mut broker = MockBroker::new()
            .with_positions(vec![
                pos(&todays_symbol("C00000500"), 1.0),
                pos(&stuck, 1.0),
            ])
            // Re-fetch after the partial close still shows the stuck contract.
            .with_positions(vec![pos(&stuck, 1.0)]);
        broker.reject_symbols.insert(stuck.clone());
        let broker = Arc::new(broker);
        let executor = SignalExecutor::new(broker.clone(), test_config());

        let result = executor.process_signal("buy").await;
        assert_eq!(result.outcome, Outcome::Failure(FailureKind::Rejected));
        assert!(result.message.contains("aborting entry"));
        assert!(!broker
            .submitted()
            .iter()
            .any(|o| o.side == OrderSide::BuyToOpen));
    }

    #[tokio::test]
    async fn test_partial_close_outside_family_enters_with_warning() {
        let mut broker = MockBroker::new()
            .with_positions(vec![pos(&todays_symbol("C00000500"), 1.0), pos("TLT", 10.0)])
            // Only the unrelated holding is left after the partial close.
            .with_positions(vec![pos("TLT", 10.0)]);
        broker.reject_symbols.insert("TLT".to_string());
        let broker = Arc::new(broker);
        let executor = SignalExecutor::new(broker.clone(), test_config());

        let result = executor.process_signal("buy").await;
        assert_eq!(result.outcome, Outcome::PartialFailure);
        assert!(result.order_id.is_some());
        assert!(result.message.contains("1 of 2 positions closed"));
        assert!(broker
            .submitted()
            .iter()
            .any(|o| o.side == OrderSide::BuyToOpen));
    }

    #[tokio::test]
    async fn test_unavailable_quote_fails_before_submission() {
        let mut broker = MockBroker::new();
        broker.underlying = Err(BrokerError::Unavailable("connect timeout".to_string()));
        let broker = Arc::new(broker);
        let executor = SignalExecutor::new(broker.clone(), test_config());

        let result = executor.process_signal("buy").await;
        assert_eq!(result.outcome, Outcome::Failure(FailureKind::Unavailable));
        assert!(broker.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_missing_balance_field_is_reported() {
        let mut broker = MockBroker::new();
        broker.cash = Err(BrokerError::FieldMissing("cash_available"));
        let broker = Arc::new(broker);
        let executor = SignalExecutor::new(broker, test_config());

        let result = executor.process_signal("buy").await;
        assert_eq!(result.outcome, Outcome::Failure(FailureKind::FieldMissing));
    }

    #[tokio::test]
    async fn test_rejected_entry_preserves_diagnostics() {
        let mut broker = MockBroker::new();
        broker.reject_symbols.insert(todays_symbol("C00000500"));
        let broker = Arc::new(broker);
        let executor = SignalExecutor::new(broker, test_config());

        let result = executor.process_signal("buy").await;
        assert_eq!(result.outcome, Outcome::Failure(FailureKind::Rejected));
        assert!(result.message.contains(&todays_symbol("C00000500")));
    }

    #[tokio::test]
    async fn test_concurrent_signal_gets_busy() {
        let mut broker =
            MockBroker::new().with_positions(vec![pos(&todays_symbol("C00000500"), 1.0)]);
        broker.submit_delay = Duration::from_millis(150);
        let broker = Arc::new(broker);

        let mut config = test_config();
        config.busy_timeout = Duration::ZERO;
        let executor = Arc::new(SignalExecutor::new(broker.clone(), config));

        let first = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.process_signal("buy").await })
        };
        // Let the first run take the gate and start its slow close order.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = executor.process_signal("sell").await;
        assert_eq!(second.outcome, Outcome::Failure(FailureKind::Busy));

        let first = first.await.unwrap();
        assert_eq!(first.outcome, Outcome::Success);
        // The rejected signal never reached the brokerage: every submitted
        // order belongs to the first run (close + call entry).
        let orders = broker.submitted();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].option_symbol, todays_symbol("C00000500"));
    }

    #[tokio::test]
    async fn test_health_reports_configured_credentials() {
        let executor = SignalExecutor::new(Arc::new(MockBroker::new()), test_config());
        assert!(executor.health().configured);

        let mut config = test_config();
        config.access_token = String::new();
        let executor = SignalExecutor::new(Arc::new(MockBroker::new()), config);
        assert!(!executor.health().configured);
    }
}
