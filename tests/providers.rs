use std::time::Duration;

use advancia_ledger::{
    error::AppError,
    services::{
        ai_service::OllamaClient,
        nowpayments::{CreatePaymentParams, NowPaymentsClient},
    },
};
use mockito::Matcher;
use serde_json::json;

fn payment_params() -> CreatePaymentParams {
    CreatePaymentParams {
        price_amount: 100.5,
        price_currency: "usd".into(),
        pay_currency: "btc".into(),
        order_id: "8f2c1a4e-0d3b-4b7a-9a51-2f6f1c0d9e11".into(),
        order_description: None,
        ipn_callback_url: Some("https://api.advancia.test/api/payments/ipn/nowpayments".into()),
    }
}

#[tokio::test]
async fn test_create_payment_sends_api_key_and_reads_numeric_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/payment")
        .match_header("x-api-key", "np-test-key")
        .match_body(Matcher::PartialJson(json!({
            "price_amount": 100.5,
            "pay_currency": "btc",
            "order_id": "8f2c1a4e-0d3b-4b7a-9a51-2f6f1c0d9e11",
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "payment_id": 5077125051u64,
                "payment_status": "waiting",
                "pay_address": "bc1qtestaddress",
                "pay_amount": 0.0015,
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client =
        NowPaymentsClient::new(format!("{}/v1", server.url()), Some("np-test-key".into())).unwrap();
    let created = client.create_payment(&payment_params()).await.unwrap();

    assert_eq!(created.payment_id, "5077125051");
    assert_eq!(created.payment_status, "waiting");
    assert_eq!(created.pay_address.as_deref(), Some("bc1qtestaddress"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_payment_provider_rejection() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/payment")
        .with_status(400)
        .with_body(r#"{"message":"pay_currency is not supported"}"#)
        .create_async()
        .await;

    let client = NowPaymentsClient::new(server.url(), Some("np-test-key".into())).unwrap();
    let result = client.create_payment(&payment_params()).await;

    assert!(matches!(result, Err(AppError::Provider(_))));
    mock.assert_async().await;
}

fn ollama(url: String, max_retries: u32) -> OllamaClient {
    OllamaClient::new(url, "llama3", max_retries, Duration::from_secs(5))
}

#[tokio::test]
async fn test_ollama_generate_returns_trimmed_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({ "model": "llama3", "stream": false })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "response": "  - Low risk\nRecommendation: APPROVE\n" }).to_string())
        .create_async()
        .await;

    let summary = ollama(server.url(), 2).generate("review this").await.unwrap();

    assert_eq!(summary, "- Low risk\nRecommendation: APPROVE");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ollama_retries_server_errors_until_budget_is_spent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let result = ollama(server.url(), 2).generate("review this").await;

    assert!(matches!(result, Err(AppError::Provider(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ollama_does_not_retry_client_errors() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .with_status(400)
        .expect(1)
        .create_async()
        .await;

    let result = ollama(server.url(), 3).generate("review this").await;

    assert!(matches!(result, Err(AppError::Provider(_))));
    mock.assert_async().await;
}
