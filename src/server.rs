//! Co-signer HTTP service
//!
//! - `POST /sign-and-send-solana`: co-sign, submit and confirm a user-signed transaction
//! - `GET /fee-payer`: fee-payer address and balance
//! - `GET /health`
//! - `GET /metrics`: Prometheus text format

use crate::gasless::contract::{CoSignRequest, CoSignResponse, FeePayerStatus};
use crate::gasless::cosigner::CoSigner;
use crate::gasless::errors::GaslessError;
use crate::metrics::metrics;
use crate::observability::{CorrelationId, CORRELATION_HEADER};
use crate::rpc::LedgerClient;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, Instrument};

#[derive(Clone)]
pub struct AppState {
    cosigner: Arc<CoSigner<dyn LedgerClient>>,
    enable_metrics: bool,
}

impl AppState {
    pub fn new(cosigner: Arc<CoSigner<dyn LedgerClient>>, enable_metrics: bool) -> Self {
        Self {
            cosigner,
            enable_metrics,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sign-and-send-solana", post(sign_and_send))
        .route("/fee-payer", get(fee_payer))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, fee_payer = %state.cosigner.fee_payer(), "Co-signer listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

/// Serve on an already-bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Requests refused before any signing are the caller's fault
fn rejection_status(error: &GaslessError) -> StatusCode {
    if error.is_detection_stage() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    }
}

async fn sign_and_send(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CoSignRequest>, JsonRejection>,
) -> Response {
    let correlation_id = CorrelationId::from_header(
        headers
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok()),
    );
    let span = tracing::info_span!("co_sign_request", correlation_id = %correlation_id);

    let (status, response) = async {
        let request = match payload {
            Ok(Json(request)) => request,
            Err(rejection) => {
                let error = GaslessError::MalformedTransaction(rejection.body_text());
                return (rejection_status(&error), state.cosigner.reject(&error));
            }
        };

        let transaction = match request.decode_transaction() {
            Ok(transaction) => transaction,
            Err(error) => return (rejection_status(&error), state.cosigner.reject(&error)),
        };

        let response = match state
            .cosigner
            .co_sign_transaction(transaction, request.last_valid_block_height)
            .await
        {
            Ok(receipt) => CoSignResponse::succeeded(&receipt),
            Err(failure) => CoSignResponse::failed(&failure, &state.cosigner.fee_payer()),
        };
        (StatusCode::OK, response)
    }
    .instrument(span)
    .await;

    let mut http = (status, Json(response)).into_response();
    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        http.headers_mut()
            .insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    http
}

async fn fee_payer(State(state): State<AppState>) -> Response {
    let fee_payer = state.cosigner.fee_payer();
    match state.cosigner.fee_payer_balance().await {
        Ok(balance) => Json(FeePayerStatus::new(
            &fee_payer,
            balance,
            state.cosigner.policy().min_balance_lamports,
        ))
        .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": e.to_string(),
                "feePayerAddress": fee_payer.to_string(),
            })),
        )
            .into_response(),
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "feePayerAddress": state.cosigner.fee_payer().to_string(),
    }))
}

async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    if !state.enable_metrics {
        return StatusCode::NOT_FOUND.into_response();
    }
    match metrics().render() {
        Ok(text) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
