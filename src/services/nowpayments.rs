//! NOWPayments integration: IPN signature verification and payment creation.
//!
//! # IPN Signatures
//!
//! NOWPayments signs each callback with HMAC-SHA512 keyed by the merchant's
//! IPN secret. The signed message is the JSON body with object keys sorted
//! recursively and no insignificant whitespace. The hex digest arrives in
//! the `x-nowpayments-sig` header.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha512;
use url::Url;

use crate::{config::Config, error::AppError, models::payment::deserialize_provider_id};

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the IPN signature.
pub const SIGNATURE_HEADER: &str = "x-nowpayments-sig";

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Re-serialize an IPN body with keys sorted at every level.
///
/// Numbers keep their original text (`arbitrary_precision`), so
/// `0.0000015` is not rewritten as `1.5e-6`.
pub fn canonical_json(body: &[u8]) -> Result<String, AppError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("IPN body is not valid JSON: {e}")))?;

    serde_json::to_string(&sort_keys(value))
        .map_err(|e| AppError::Internal(format!("IPN canonicalization failed: {e}")))
}

fn mac_for(secret: &str, message: &str) -> Result<HmacSha512, AppError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC key rejected: {e}")))?;
    mac.update(message.as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA512 of an already-canonical message.
pub fn sign(secret: &str, canonical: &str) -> Result<String, AppError> {
    let mac = mac_for(secret, canonical)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify an IPN body against its signature header value.
///
/// Comparison is constant-time (`Mac::verify_slice`).
///
/// # Errors
///
/// - `InvalidRequest`: body is not JSON
/// - `InvalidSignature`: signature is not hex or does not match
pub fn verify_ipn_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), AppError> {
    let canonical = canonical_json(body)?;

    let expected = hex::decode(signature.trim().to_ascii_lowercase())
        .map_err(|_| AppError::InvalidSignature)?;

    mac_for(secret, &canonical)?
        .verify_slice(&expected)
        .map_err(|_| AppError::InvalidSignature)
}

/// Body for `POST {api}/payment`.
#[derive(Debug, Serialize)]
pub struct CreatePaymentParams {
    pub price_amount: f64,
    pub price_currency: String,
    pub pay_currency: String,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipn_callback_url: Option<String>,
}

/// Fields read from the provider's payment creation response.
#[derive(Debug, Deserialize)]
pub struct CreatedPayment {
    #[serde(deserialize_with = "deserialize_provider_id")]
    pub payment_id: String,
    pub payment_status: String,
    pub pay_address: Option<String>,
    pub pay_amount: Option<f64>,
}

/// HTTP client for the NOWPayments REST API.
#[derive(Debug, Clone)]
pub struct NowPaymentsClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl NowPaymentsClient {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Result<Self, AppError> {
        let api_url = api_url.into();
        Url::parse(&api_url)
            .map_err(|e| AppError::Internal(format!("Invalid NOWPayments API URL {api_url:?}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(&config.nowpayments_api_url, config.nowpayments_api_key.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Register a payment with the provider.
    ///
    /// # Errors
    ///
    /// - `NotConfigured`: no API key
    /// - `Provider`: transport failure or non-2xx answer
    pub async fn create_payment(
        &self,
        params: &CreatePaymentParams,
    ) -> Result<CreatedPayment, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AppError::NotConfigured("NOWPayments API key"))?;

        let response = self
            .client
            .post(format!("{}/payment", self.api_url))
            .header("x-api-key", api_key)
            .json(params)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("NOWPayments request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "NOWPayments rejected payment creation");
            return Err(AppError::Provider(format!(
                "NOWPayments returned {status}"
            )));
        }

        response
            .json::<CreatedPayment>()
            .await
            .map_err(|e| AppError::Provider(format!("NOWPayments response unreadable: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "ipn-secret-for-tests";

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let body = br#"{"b": 1, "a": {"z": true, "m": [ {"y": 1, "x": 2} ]}}"#;
        assert_eq!(
            canonical_json(body).unwrap(),
            r#"{"a":{"m":[{"x":2,"y":1}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn canonical_json_keeps_number_text() {
        let body = br#"{"payment_id":1,"actually_paid":0.0000015,"price_amount":100.50,"pay_amount":1e-7}"#;
        assert_eq!(
            canonical_json(body).unwrap(),
            r#"{"actually_paid":0.0000015,"pay_amount":1e-7,"payment_id":1,"price_amount":100.50}"#
        );
    }

    #[test]
    fn small_amount_signature_verifies() {
        // Signed exactly as the provider serializes it
        let signed = r#"{"actually_paid":0.0000015,"payment_id":5077125051,"payment_status":"finished"}"#;
        let signature = sign(SECRET, signed).unwrap();

        let received = br#"{"payment_status":"finished","payment_id":5077125051,"actually_paid":0.0000015}"#;
        assert!(verify_ipn_signature(SECRET, received, &signature).is_ok());
    }

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"payment_status":"finished","payment_id":5077125051,"order_id":"abc"}"#;
        let signature = sign(SECRET, &canonical_json(body).unwrap()).unwrap();
        assert_eq!(signature.len(), 128);
        assert!(verify_ipn_signature(SECRET, body, &signature).is_ok());
    }

    #[test]
    fn signature_ignores_key_order_and_whitespace() {
        let signed = br#"{"a":1,"b":2}"#;
        let received = br#"{ "b": 2,
            "a": 1 }"#;
        let signature = sign(SECRET, &canonical_json(signed).unwrap()).unwrap();
        assert!(verify_ipn_signature(SECRET, received, &signature).is_ok());
    }

    #[test]
    fn uppercase_hex_signature_is_accepted() {
        let body = br#"{"payment_id":1,"payment_status":"waiting"}"#;
        let signature = sign(SECRET, &canonical_json(body).unwrap())
            .unwrap()
            .to_uppercase();
        assert!(verify_ipn_signature(SECRET, body, &signature).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = br#"{"payment_id":1,"payment_status":"waiting"}"#;
        let signature = sign(SECRET, &canonical_json(body).unwrap()).unwrap();
        let tampered = br#"{"payment_id":1,"payment_status":"finished"}"#;
        assert!(matches!(
            verify_ipn_signature(SECRET, tampered, &signature),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = br#"{"payment_id":1,"payment_status":"finished"}"#;
        let signature = sign("other-secret", &canonical_json(body).unwrap()).unwrap();
        assert!(matches!(
            verify_ipn_signature(SECRET, body, &signature),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn non_hex_or_truncated_signature_is_rejected() {
        let body = br#"{"payment_id":1}"#;
        assert!(matches!(
            verify_ipn_signature(SECRET, body, "not-hex"),
            Err(AppError::InvalidSignature)
        ));
        let signature = sign(SECRET, &canonical_json(body).unwrap()).unwrap();
        assert!(matches!(
            verify_ipn_signature(SECRET, body, &signature[..64]),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn invalid_json_is_a_bad_request() {
        assert!(matches!(
            verify_ipn_signature(SECRET, b"payment_id=1", "00"),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn malformed_api_url_is_rejected() {
        assert!(matches!(
            NowPaymentsClient::new("not a url", Some("key".into())),
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_to_create_payments() {
        let client = NowPaymentsClient::new("http://127.0.0.1:9", None).unwrap();
        assert!(!client.is_configured());
        let params = CreatePaymentParams {
            price_amount: 10.0,
            price_currency: "usd".into(),
            pay_currency: "btc".into(),
            order_id: "order-1".into(),
            order_description: None,
            ipn_callback_url: None,
        };
        assert!(matches!(
            client.create_payment(&params).await,
            Err(AppError::NotConfigured(_))
        ));
    }
}
