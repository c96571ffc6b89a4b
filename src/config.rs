//! Centralized configuration loaded from the environment.
//!
//! Loading happens once at startup; the resulting struct is immutable and
//! injected into each component at construction. Credentials and the
//! account identifier are never hardcoded.

use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Live environment base URL
pub const LIVE_BASE_URL: &str = "https://api.tradier.com/v1";

/// Paper-trading (sandbox) environment base URL
pub const SANDBOX_BASE_URL: &str = "https://sandbox.tradier.com/v1";

#[derive(Debug, Clone)]
pub struct Config {
    /// Brokerage API base URL
    pub base_url: String,
    /// Bearer credential for the brokerage API
    pub access_token: String,
    /// Account to trade
    pub account_id: String,
    /// Fraction of cash committed to one entry order, in (0, 1]
    pub safety_fraction: f64,
    /// Hard ceiling on contracts per order
    pub max_contracts: u32,
    /// Wait after close orders before sizing the entry
    pub settle_delay: Duration,
    /// Per-call HTTP timeout
    pub http_timeout: Duration,
    /// How long a second signal waits for the account gate before
    /// failing busy
    pub busy_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Expects:
    /// - `TRADIER_ACCESS_TOKEN` - API access token
    /// - `TRADIER_ACCOUNT_ID` - Account to trade
    /// - `TRADIER_LIVE` (optional) - Set to "true" for live trading
    /// - `TRADIER_BASE_URL` (optional) - Explicit base URL override
    /// - `SAFETY_FRACTION` (optional, default 0.90)
    /// - `MAX_CONTRACTS` (optional, default 5)
    /// - `SETTLE_DELAY_SECS` (optional, default 3)
    /// - `HTTP_TIMEOUT_SECS` (optional, default 10)
    /// - `BUSY_TIMEOUT_SECS` (optional, default 5)
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("TRADIER_ACCESS_TOKEN")
            .context("TRADIER_ACCESS_TOKEN environment variable not set")?;
        let account_id = std::env::var("TRADIER_ACCOUNT_ID")
            .context("TRADIER_ACCOUNT_ID environment variable not set")?;

        let is_live = std::env::var("TRADIER_LIVE")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);
        let base_url = std::env::var("TRADIER_BASE_URL").unwrap_or_else(|_| {
            if is_live {
                LIVE_BASE_URL.to_string()
            } else {
                SANDBOX_BASE_URL.to_string()
            }
        });

        let safety_fraction: f64 = env_or("SAFETY_FRACTION", 0.90)?;
        if !(safety_fraction > 0.0 && safety_fraction <= 1.0) {
            bail!("SAFETY_FRACTION must be in (0, 1], got {safety_fraction}");
        }
        let max_contracts: u32 = env_or("MAX_CONTRACTS", 5)?;
        if max_contracts == 0 {
            bail!("MAX_CONTRACTS must be at least 1");
        }

        Ok(Self {
            base_url,
            access_token,
            account_id,
            safety_fraction,
            max_contracts,
            settle_delay: Duration::from_secs(env_or("SETTLE_DELAY_SECS", 3)?),
            http_timeout: Duration::from_secs(env_or("HTTP_TIMEOUT_SECS", 10)?),
            busy_timeout: Duration::from_secs(env_or("BUSY_TIMEOUT_SECS", 5)?),
        })
    }
}

/// Parse an optional environment variable, falling back to a default
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
