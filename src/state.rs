//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    services::{ai_service::OllamaClient, notifier::Notifier, nowpayments::NowPaymentsClient},
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub notifier: Notifier,
    pub nowpayments: NowPaymentsClient,
    pub ai: OllamaClient,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Result<Self, AppError> {
        let nowpayments = NowPaymentsClient::from_config(&config)?;
        let ai = OllamaClient::from_config(&config);

        Ok(Self {
            pool,
            config: Arc::new(config),
            notifier: Notifier::default(),
            nowpayments,
            ai,
        })
    }
}
