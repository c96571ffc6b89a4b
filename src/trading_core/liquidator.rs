//! Position Liquidation
//!
//! Enumerates open positions and closes each with a direction-correct
//! market order. Per-position failures are counted, not propagated: one
//! bad position must never block closing the others.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::broker::{Broker, BrokerError};

/// Result of a close-all pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Nothing was open
    NoPositions,
    /// Every close order was accepted
    AllClosed(usize),
    /// Some close orders were accepted, some were not
    PartiallyClosed { closed: usize, total: usize },
    /// Every close order failed
    AllFailed(usize),
}

/// Close every open position.
///
/// Errs only when the position listing itself fails; order-level failures
/// are absorbed into the outcome. When at least one close order was
/// accepted, waits `settle_delay` before returning so the account state
/// has a chance to reflect the closes before entry sizing reads it. This
/// is a best-effort mitigation: the brokerage's eventual-consistency
/// window is not otherwise bounded.
pub async fn close_all(
    broker: &dyn Broker,
    settle_delay: Duration,
) -> Result<CloseOutcome, BrokerError> {
    let positions = broker.open_positions().await?;

    let orders: Vec<_> = positions
        .iter()
        .filter_map(|p| p.close_order().map(|o| (p, o)))
        .collect();
    if orders.is_empty() {
        debug!("No open positions to close");
        return Ok(CloseOutcome::NoPositions);
    }

    let total = orders.len();
    let mut closed = 0;
    for (position, order) in orders {
        info!(
            "Closing position: {} {} {} @ MKT",
            order.side, order.quantity, order.option_symbol
        );
        match broker.submit_order(&order).await {
            Ok(ack) => {
                debug!("Close order accepted for {}: ID {}", position.symbol, ack.id);
                closed += 1;
            }
            Err(e) => {
                warn!("Failed to close {}: {}", position.symbol, e);
            }
        }
    }

    if closed > 0 && !settle_delay.is_zero() {
        debug!("Waiting {:?} for close orders to settle", settle_delay);
        tokio::time::sleep(settle_delay).await;
    }

    Ok(if closed == total {
        CloseOutcome::AllClosed(total)
    } else if closed > 0 {
        CloseOutcome::PartiallyClosed { closed, total }
    } else {
        CloseOutcome::AllFailed(total)
    })
}
