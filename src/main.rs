use anyhow::Result;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info, warn};

use spy_zero_dte::trading_core::executor::{HealthStatus, Outcome, SignalExecutor};
use spy_zero_dte::{Config, TradierClient};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to run the webhook server on
    #[arg(short, long, env = "WEBHOOK_PORT", default_value = "3000")]
    port: u16,
}

/// Inbound webhook body, e.g. `{"signal": "buy"}`
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    signal: Option<String>,
}

#[derive(Debug, Serialize)]
struct SignalResponse {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<i64>,
}

struct AppState {
    /// Present when brokerage credentials were configured at startup
    executor: Option<SignalExecutor>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spy_zero_dte=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let executor = match Config::from_env() {
        Ok(config) => {
            info!(
                "Trading account {} against {}",
                config.account_id, config.base_url
            );
            let client = TradierClient::new(&config);
            Some(SignalExecutor::new(Arc::new(client), config))
        }
        Err(e) => {
            warn!("Brokerage not configured, serving health checks only: {e:#}");
            None
        }
    };

    let state = Arc::new(AppState { executor });

    let app = Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Webhook server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> Json<SignalResponse> {
    let Some(executor) = &state.executor else {
        return Json(SignalResponse {
            status: "error",
            message: "brokerage credentials are not configured".to_string(),
            order_id: None,
        });
    };

    let raw = payload.signal.unwrap_or_default();
    let result = executor.process_signal(&raw).await;

    let status = match result.outcome {
        Outcome::Success => "success",
        Outcome::PartialFailure => "partial",
        Outcome::Failure(kind) => {
            error!("Signal failed ({:?}): {}", kind, result.message);
            "error"
        }
    };

    Json(SignalResponse {
        status,
        message: result.message,
        order_id: result.order_id,
    })
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    match &state.executor {
        Some(executor) => Json(executor.health()),
        None => Json(HealthStatus { configured: false }),
    }
}
