//! Invoice extraction: the HTTP proxy in front of the LLM gateway, and the
//! client the UI uses to reach it.

pub mod client;
pub mod gateway;
pub mod proxy;

use serde::{Deserialize, Serialize};

use crate::models::Invoice;

pub use client::{MAX_DOCUMENT_BYTES, ScanClient, ScanError, load_document};
pub use gateway::{CompletionApi, GatewayError, HttpGateway};
pub use proxy::{ProxyError, ProxyState, router};

/// Body of `POST /scan-invoice`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Document as a `data:` URL.
    #[serde(rename = "imageData", default)]
    pub image_data: Option<String>,
}

/// Reply of `POST /scan-invoice`: exactly one of `data` or `error` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Invoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanReply {
    pub fn data(invoice: Invoice) -> Self {
        Self {
            data: Some(invoice),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }
}
