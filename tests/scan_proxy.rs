//! HTTP-level tests of the extraction proxy against a scripted gateway.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum_test::TestServer;
use serde_json::{Value, json};

use invoice_tracker::scan::gateway::ChatResponse;
use invoice_tracker::scan::{CompletionApi, GatewayError, ProxyState, ScanClient, ScanError, router};

const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

enum Script {
    Extracted(Value),
    Status(u16),
    NoToolCall,
}

struct StubGateway {
    script: Script,
    seen: Mutex<Vec<Value>>,
}

impl StubGateway {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Value> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionApi for StubGateway {
    async fn complete(&self, request: &Value) -> Result<ChatResponse, GatewayError> {
        self.seen.lock().unwrap().push(request.clone());

        let body = match &self.script {
            Script::Extracted(fields) => json!({
                "choices": [{
                    "message": {
                        "tool_calls": [{
                            "function": {
                                "name": "extract_invoice_data",
                                "arguments": fields.to_string()
                            }
                        }]
                    }
                }]
            }),
            Script::NoToolCall => json!({
                "choices": [{ "message": { "content": "I cannot read this image." } }]
            }),
            Script::Status(status) => {
                return Err(GatewayError::Status {
                    status: *status,
                    body: "upstream says no".to_string(),
                });
            }
        };
        Ok(serde_json::from_value(body).unwrap())
    }
}

fn extracted_fields() -> Value {
    json!({
        "CLIENT": "Acme Trading LLC",
        "INVOICE NO.": "24-0042",
        "INVOICE DATE": "2024-05-17",
        "CLIENT TRN": "100234567800003",
        "DESCRIPTION": "Shopfront lightbox",
        "INVOICE SUB-TOTAL": "4000.00",
        "REBATE": "0",
        "INVOICE SUB-TOTAL AFTER REBATE": "4000.00",
        "VAT % AMOUNT": "200.00",
        "TOTAL INVOICE AMOUNT": "4200.00",
        "Sales Person": "Mira",
        "_year": "2024"
    })
}

fn server_with(gateway: Option<Arc<StubGateway>>) -> TestServer {
    let gateway = gateway.map(|g| g as Arc<dyn CompletionApi>);
    TestServer::new(router(ProxyState::new(gateway, "test-model")))
}

#[tokio::test]
async fn health_check_answers_ok() {
    let server = server_with(None);
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn missing_image_is_rejected_before_the_gateway() {
    let gateway = StubGateway::new(Script::Extracted(extracted_fields()));
    let server = server_with(Some(gateway.clone()));

    for body in [json!({}), json!({ "imageData": null }), json!({ "imageData": "" })] {
        let response = server.post("/scan-invoice").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let reply: Value = response.json();
        assert_eq!(reply, json!({ "error": "No image data provided" }));
    }

    let response = server.post("/scan-invoice").text("not json").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let gateway = StubGateway::new(Script::Extracted(extracted_fields()));
    let server = server_with(Some(gateway.clone()));

    let image = format!("data:image/png;base64,{}", "A".repeat(33 * 1024 * 1024));
    let response = server
        .post("/scan-invoice")
        .json(&json!({ "imageData": image }))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let reply: Value = response.json();
    assert_eq!(reply["error"], "Image data too large. Documents are limited to 20 MB.");
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn success_returns_extracted_fields_unchanged() {
    let gateway = StubGateway::new(Script::Extracted(extracted_fields()));
    let server = server_with(Some(gateway.clone()));

    let response = server
        .post("/scan-invoice")
        .json(&json!({ "imageData": IMAGE }))
        .await;

    response.assert_status_ok();
    let reply: Value = response.json();
    assert_eq!(reply, json!({ "data": extracted_fields() }));

    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["model"], "test-model");
    assert_eq!(requests[0]["messages"][0]["content"][1]["image_url"]["url"], IMAGE);
    assert_eq!(requests[0]["tool_choice"]["function"]["name"], "extract_invoice_data");
}

#[tokio::test]
async fn missing_year_defaults_to_the_current_one() {
    let mut fields = extracted_fields();
    fields.as_object_mut().unwrap().remove("_year");
    let server = server_with(Some(StubGateway::new(Script::Extracted(fields))));

    let response = server
        .post("/scan-invoice")
        .json(&json!({ "imageData": IMAGE }))
        .await;

    response.assert_status_ok();
    let reply: Value = response.json();
    let this_year = chrono::Datelike::year(&chrono::Local::now()).to_string();
    assert_eq!(reply["data"]["_year"], this_year);
    assert_eq!(reply["data"]["INVOICE NO."], "24-0042");
}

#[tokio::test]
async fn upstream_rate_limit_and_credit_errors_keep_their_status() {
    let cases = [
        (429, StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded. Please try again later."),
        (402, StatusCode::PAYMENT_REQUIRED, "AI credits exhausted. Please add credits to continue."),
        (503, StatusCode::INTERNAL_SERVER_ERROR, "Failed to process invoice"),
    ];

    for (upstream, status, message) in cases {
        let server = server_with(Some(StubGateway::new(Script::Status(upstream))));
        let response = server
            .post("/scan-invoice")
            .json(&json!({ "imageData": IMAGE }))
            .await;

        response.assert_status(status);
        let reply: Value = response.json();
        assert_eq!(reply["error"], message);
        assert!(reply.get("data").is_none());
    }
}

#[tokio::test]
async fn missing_tool_call_is_a_generic_failure() {
    let server = server_with(Some(StubGateway::new(Script::NoToolCall)));
    let response = server
        .post("/scan-invoice")
        .json(&json!({ "imageData": IMAGE }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let reply: Value = response.json();
    assert_eq!(reply["error"], "Failed to extract invoice data");
}

#[tokio::test]
async fn unconfigured_gateway_is_a_server_error() {
    let server = server_with(None);
    let response = server
        .post("/scan-invoice")
        .json(&json!({ "imageData": IMAGE }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let reply: Value = response.json();
    assert_eq!(reply["error"], "AI service not configured");
}

#[tokio::test]
async fn cors_is_open_to_any_origin() {
    let server = server_with(Some(StubGateway::new(Script::Extracted(extracted_fields()))));

    let preflight = server
        .method(Method::OPTIONS, "/scan-invoice")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://books.example.com"))
        .add_header(header::ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("POST"))
        .await;
    preflight.assert_status_ok();
    assert_eq!(
        preflight.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(&HeaderValue::from_static("*"))
    );

    let response = server
        .post("/scan-invoice")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://books.example.com"))
        .json(&json!({ "imageData": IMAGE }))
        .await;
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(&HeaderValue::from_static("*"))
    );
}

#[tokio::test]
async fn scan_client_round_trips_through_a_live_proxy() {
    let gateway = StubGateway::new(Script::Extracted(extracted_fields()));
    let app = router(ProxyState::new(Some(gateway as Arc<dyn CompletionApi>), "test-model"));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = ScanClient::new(format!("http://{}/scan-invoice", addr));
    let invoice = client.extract(IMAGE).await.unwrap();
    assert_eq!(invoice.client, "Acme Trading LLC");
    assert_eq!(invoice.invoice_no, "24-0042");
    assert_eq!(invoice.total_amount, "4200.00");

    let err = client.extract("").await.unwrap_err();
    assert!(matches!(
        err,
        ScanError::Service { status: 400, ref message } if message == "No image data provided"
    ));
}
