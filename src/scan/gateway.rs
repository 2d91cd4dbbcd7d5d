use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

pub const TOOL_NAME: &str = "extract_invoice_data";

const EXTRACTION_PROMPT: &str = "Extract invoice details from this image. You must extract these exact fields:
- CLIENT (client name)
- INVOICE NO. (invoice number)
- INVOICE DATE (in YYYY-MM-DD format)
- CLIENT TRN (tax registration number)
- DESCRIPTION (brief description of items/services)
- INVOICE SUB-TOTAL (subtotal amount as number only, no currency)
- REBATE (rebate amount as number only, use \"0\" if not present)
- INVOICE SUB-TOTAL AFTER REBATE (subtotal after rebate as number only)
- VAT % AMOUNT (VAT amount as number only)
- TOTAL INVOICE AMOUNT (total amount as number only)
- Sales Person (sales person name)
- _year (four digit year of the invoice date)

Look carefully at the invoice and extract all visible information.";

/// Fields the model must always return. `_year` is optional.
pub const REQUIRED_FIELDS: [&str; 11] = [
    "CLIENT",
    "INVOICE NO.",
    "INVOICE DATE",
    "CLIENT TRN",
    "DESCRIPTION",
    "INVOICE SUB-TOTAL",
    "REBATE",
    "INVOICE SUB-TOTAL AFTER REBATE",
    "VAT % AMOUNT",
    "TOTAL INVOICE AMOUNT",
    "Sales Person",
];

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("gateway unreachable: {0}")]
    Transport(String),
}

/// Chat-completions endpoint of the multimodal model.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(&self, request: &Value) -> Result<ChatResponse, GatewayError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ChatResponse {
    /// Raw JSON arguments of the first tool call, if the model produced one.
    pub fn tool_arguments(&self) -> Option<&str> {
        self.choices
            .first()?
            .message
            .tool_calls
            .as_ref()?
            .first()?
            .function
            .arguments
            .as_deref()
            .filter(|args| !args.trim().is_empty())
    }
}

/// Request forcing the model to answer through the extraction tool.
pub fn extraction_request(model: &str, image_data: &str) -> Value {
    let mut properties = serde_json::Map::new();
    for field in REQUIRED_FIELDS.iter().chain(["_year"].iter()) {
        properties.insert(field.to_string(), json!({ "type": "string" }));
    }

    json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": EXTRACTION_PROMPT },
                { "type": "image_url", "image_url": { "url": image_data } }
            ]
        }],
        "tools": [{
            "type": "function",
            "function": {
                "name": TOOL_NAME,
                "description": "Extract structured invoice data from the image",
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": REQUIRED_FIELDS,
                    "additionalProperties": false
                }
            }
        }],
        "tool_choice": { "type": "function", "function": { "name": TOOL_NAME } }
    })
}

/// OpenAI-compatible gateway reached over HTTPS.
pub struct HttpGateway {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpGateway {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CompletionApi for HttpGateway {
    async fn complete(&self, request: &Value) -> Result<ChatResponse, GatewayError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        debug!(%body, "gateway response");

        serde_json::from_str(&body).map_err(|e| GatewayError::Transport(format!("malformed gateway response: {}", e)))
    }
}
