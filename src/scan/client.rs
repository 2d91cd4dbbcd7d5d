use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mime::Mime;
use tracing::info;

use super::{ScanReply, ScanRequest};
use crate::models::Invoice;

/// Largest document accepted for extraction.
pub const MAX_DOCUMENT_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("file is {size} bytes, the limit is 20 MB")]
    TooLarge { size: u64 },
    #[error("unsupported file type `{0}`, expected an image or a PDF")]
    UnsupportedType(String),
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("scan service unreachable: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{message}")]
    Service { status: u16, message: String },
}

/// Content type inferred from the file extension.
pub fn mime_for_path(path: &Path) -> Result<Mime, ScanError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let mime = match extension.as_str() {
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "png" => mime::IMAGE_PNG,
        "gif" => mime::IMAGE_GIF,
        "pdf" => mime::APPLICATION_PDF,
        "webp" | "heic" | "heif" => format!("image/{}", extension)
            .parse::<Mime>()
            .map_err(|_| ScanError::UnsupportedType(extension.clone()))?,
        _ => return Err(ScanError::UnsupportedType(extension.clone())),
    };
    Ok(mime)
}

pub fn to_data_url(mime: &Mime, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime.essence_str(), STANDARD.encode(bytes))
}

/// Read a captured or uploaded document into a `data:` URL.
///
/// The size ceiling is checked before the file is read.
pub fn load_document(path: &Path) -> Result<String, ScanError> {
    let mime = mime_for_path(path)?;

    let size = fs::metadata(path)?.len();
    if size > MAX_DOCUMENT_BYTES {
        return Err(ScanError::TooLarge { size });
    }

    let bytes = fs::read(path)?;
    Ok(to_data_url(&mime, &bytes))
}

/// Talks to the extraction proxy.
pub struct ScanClient {
    http: reqwest::Client,
    url: String,
}

impl ScanClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub async fn extract(&self, data_url: &str) -> Result<Invoice, ScanError> {
        let request = ScanRequest {
            image_data: Some(data_url.to_string()),
        };

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status().as_u16();
        let reply: ScanReply = response.json().await?;

        match reply {
            ScanReply { data: Some(invoice), .. } => {
                info!(invoice_no = %invoice.invoice_no, "scan succeeded");
                Ok(invoice)
            }
            ScanReply { error, .. } => Err(ScanError::Service {
                status,
                message: error.unwrap_or_else(|| "Failed to extract invoice data".to_string()),
            }),
        }
    }

    /// Read `path` and extract it in one go.
    pub async fn extract_file(&self, path: &Path) -> Result<Invoice, ScanError> {
        let data_url = load_document(path)?;
        self.extract(&data_url).await
    }
}
