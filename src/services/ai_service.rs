//! Admin review assistant backed by a local Ollama instance.
//!
//! Calls are retried with exponential backoff on transport errors,
//! timeouts, 429 and 5xx answers, up to the configured retry budget.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::{user::User, withdrawal::Withdrawal},
    services::{auth_service, withdrawal_service},
};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Response for `POST /api/admin/withdrawals/{id}/ai-review`.
#[derive(Debug, Serialize)]
pub struct AiReviewResponse {
    pub withdrawal_id: Uuid,
    pub model: String,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    max_retries: u32,
    timeout: Duration,
}

/// Delay before retry number `attempt` (1-based): 200ms, 400ms, 800ms...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(100 * (1u64 << attempt.min(8)))
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        max_retries: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_retries,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.ollama_url,
            &config.ollama_model,
            config.ai_max_retries,
            Duration::from_secs(config.ai_timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single non-streaming completion.
    ///
    /// # Errors
    ///
    /// `Provider` when a non-retryable status comes back or the retry
    /// budget is exhausted.
    pub async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let url = format!("{}/api/generate", self.base_url);

        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let result =
                tokio::time::timeout(self.timeout, self.client.post(&url).json(&request).send())
                    .await;

            match result {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.json::<GenerateResponse>().await {
                            Ok(body) => return Ok(body.response.trim().to_string()),
                            Err(e) => last_error = format!("unreadable response: {e}"),
                        }
                    } else if is_retryable(status) {
                        last_error = format!("Ollama returned {status}");
                    } else {
                        return Err(AppError::Provider(format!("Ollama returned {status}")));
                    }
                }
                Ok(Err(e)) => last_error = format!("request failed: {e}"),
                Err(_) => last_error = format!("timed out after {:?}", self.timeout),
            }

            tracing::warn!(attempt, max_retries = self.max_retries, error = %last_error, "Ollama call failed");
        }

        Err(AppError::Provider(format!(
            "Ollama unavailable after {} attempts: {last_error}",
            self.max_retries + 1
        )))
    }
}

fn format_cents(amount_cents: i64) -> String {
    format!("{}.{:02}", amount_cents / 100, (amount_cents % 100).abs())
}

/// Prompt describing a withdrawal for the reviewing admin.
pub fn build_review_prompt(withdrawal: &Withdrawal, requester: &User, now: DateTime<Utc>) -> String {
    let account_age_days = (now - requester.created_at).num_days().max(0);

    format!(
        "You are assisting a compliance officer reviewing a withdrawal request.\n\
         Summarize the risk in at most five short bullet points and end with a \
         recommendation of APPROVE, REJECT or ESCALATE.\n\n\
         Amount: {amount} {currency}\n\
         Method: {method}\n\
         Destination: {destination}\n\
         Status: {status}\n\
         Requester: {email}\n\
         Trust score: {trust}/100\n\
         Account age: {age} days\n",
        amount = format_cents(withdrawal.amount_cents),
        currency = withdrawal.currency,
        method = withdrawal.method,
        destination = withdrawal.destination,
        status = withdrawal.status,
        email = requester.email,
        trust = requester.trust_score,
        age = account_age_days,
    )
}

/// Ask the model for a review summary of one withdrawal.
pub async fn review_withdrawal(
    pool: &DbPool,
    ai: &OllamaClient,
    withdrawal_id: Uuid,
) -> Result<AiReviewResponse, AppError> {
    let withdrawal = withdrawal_service::get_by_id(pool, withdrawal_id).await?;
    let requester = auth_service::get_user(pool, withdrawal.user_id).await?;

    let prompt = build_review_prompt(&withdrawal, &requester, Utc::now());
    let summary = ai.generate(&prompt).await?;

    Ok(AiReviewResponse {
        withdrawal_id,
        model: ai.model().to_string(),
        summary,
    })
}
