//! Tradier API Integration
//!
//! This module provides integration with the Tradier REST API for
//! executing option trades on Tradier brokerage accounts.
//!
//! # Components
//!
//! - [`client`] - HTTP client with bearer-token authentication
//! - [`models`] - Response data types and shape normalization
//!
//! # Environment Variables
//!
//! - `TRADIER_ACCESS_TOKEN` - API access token
//! - `TRADIER_ACCOUNT_ID` - Account to trade
//! - `TRADIER_LIVE` (optional) - Set to "true" for the live environment
//! - `TRADIER_BASE_URL` (optional) - Explicit base URL override
//!
//! # API Endpoints Used
//!
//! - `GET /markets/quotes?symbols=...` - Underlying and option quotes
//! - `GET /accounts/{id}/balances` - Cash available
//! - `GET /accounts/{id}/positions` - Open positions
//! - `POST /accounts/{id}/orders` - Place market orders

pub mod client;
pub mod models;

// Re-export commonly used types
pub use client::TradierClient;
