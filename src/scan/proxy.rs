use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Datelike, Local};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::gateway::{CompletionApi, GatewayError, extraction_request};
use super::{ScanReply, ScanRequest};
use crate::models::Invoice;

/// Base64 inflates a 20 MB document to roughly 27 MB.
const BODY_LIMIT: usize = 32 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No image data provided")]
    MissingImage,
    #[error("Image data too large. Documents are limited to 20 MB.")]
    TooLarge,
    #[error("AI service not configured")]
    NotConfigured,
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("AI credits exhausted. Please add credits to continue.")]
    CreditsExhausted,
    #[error("Failed to process invoice")]
    Upstream,
    #[error("Failed to extract invoice data")]
    NoStructuredOutput,
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingImage => StatusCode::BAD_REQUEST,
            ProxyError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::CreditsExhausted => StatusCode::PAYMENT_REQUIRED,
            ProxyError::NotConfigured | ProxyError::Upstream | ProxyError::NoStructuredOutput => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<GatewayError> for ProxyError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Status { status: 429, .. } => ProxyError::RateLimited,
            GatewayError::Status { status: 402, .. } => ProxyError::CreditsExhausted,
            _ => ProxyError::Upstream,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ScanReply::error(self.to_string()))).into_response()
    }
}

/// Shared by every request; `gateway` is `None` when no API key is configured.
#[derive(Clone)]
pub struct ProxyState {
    pub gateway: Option<Arc<dyn CompletionApi>>,
    pub model: String,
}

impl ProxyState {
    pub fn new(gateway: Option<Arc<dyn CompletionApi>>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }
}

pub fn router(state: ProxyState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/health", get(health_check))
        .route("/scan-invoice", post(scan_invoice))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn scan_invoice(
    State(state): State<ProxyState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanReply>, ProxyError> {
    let image_data = match payload {
        Ok(Json(request)) => request.image_data.filter(|data| !data.trim().is_empty()),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!(%rejection, "scan request over the body limit");
            return Err(ProxyError::TooLarge);
        }
        Err(rejection) => {
            warn!(%rejection, "unreadable scan request");
            None
        }
    };
    let image_data = image_data.ok_or(ProxyError::MissingImage)?;

    let gateway = state.gateway.as_deref().ok_or_else(|| {
        error!("AI_API_KEY not configured");
        ProxyError::NotConfigured
    })?;

    let invoice = extract(gateway, &state.model, &image_data).await?;
    Ok(Json(ScanReply::data(invoice)))
}

/// Send one document to the model and parse the tool call it answers with.
pub async fn extract(gateway: &dyn CompletionApi, model: &str, image_data: &str) -> Result<Invoice, ProxyError> {
    info!(bytes = image_data.len(), "processing invoice image");

    let response = gateway
        .complete(&extraction_request(model, image_data))
        .await
        .inspect_err(|e| error!(error = %e, "gateway call failed"))?;

    let arguments = response.tool_arguments().ok_or_else(|| {
        error!("no tool call in gateway response");
        ProxyError::NoStructuredOutput
    })?;

    let mut invoice: Invoice = serde_json::from_str(arguments).map_err(|e| {
        error!(error = %e, "tool arguments are not valid invoice JSON");
        ProxyError::NoStructuredOutput
    })?;

    if invoice.year.trim().is_empty() {
        invoice.year = Local::now().year().to_string();
    }

    info!(invoice_no = %invoice.invoice_no, "invoice extracted");
    Ok(invoice)
}
