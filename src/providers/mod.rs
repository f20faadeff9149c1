pub mod twilio;
pub mod vonage;

use crate::types::{ProviderConfig, ProviderName, Recipient, SendRequest, SendResult};
use async_trait::async_trait;
use std::sync::Arc;

pub use twilio::TwilioProvider;
pub use vonage::VonageProvider;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Vendor(String),
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    fn name(&self) -> ProviderName;

    async fn send(
        &self,
        config: &ProviderConfig,
        recipients: &[Recipient],
        request: &SendRequest,
    ) -> anyhow::Result<SendResult>;
}

pub fn default_adapters(client: reqwest::Client) -> Vec<Arc<dyn SmsProvider>> {
    vec![
        Arc::new(TwilioProvider::new(client.clone())),
        Arc::new(VonageProvider::new(client)),
    ]
}

#[derive(Debug)]
pub struct RecipientOutcome {
    pub phone: String,
    pub result: Result<String, ProviderError>,
}

// Any success makes the whole send a success; only the failure count survives.
pub fn aggregate_outcomes(
    provider: ProviderName,
    unit_cost: f64,
    outcomes: Vec<RecipientOutcome>,
    request: &SendRequest,
) -> SendResult {
    let total = outcomes.len();

    if total == 1 {
        let outcome = outcomes.into_iter().next();
        return match outcome.map(|o| o.result) {
            Some(Ok(message_id)) => SendResult {
                success: true,
                message_id: Some(message_id),
                error: None,
                provider: provider.to_string(),
                cost: Some(unit_cost),
                language: request.language.clone(),
                content: request.message.clone(),
            },
            Some(Err(err)) => SendResult::failure(provider.as_str(), err.to_string(), request),
            None => SendResult::failure(provider.as_str(), "no recipients", request),
        };
    }

    let mut first_id: Option<String> = None;
    let mut failed = 0usize;
    let mut delivered = 0usize;
    for outcome in outcomes {
        match outcome.result {
            Ok(id) => {
                delivered += 1;
                if first_id.is_none() {
                    first_id = Some(id);
                }
            }
            Err(err) => {
                failed += 1;
                tracing::warn!(%provider, phone = %outcome.phone, "sms recipient failed: {err}");
            }
        }
    }

    SendResult {
        success: delivered > 0,
        message_id: first_id,
        error: if failed > 0 {
            Some(format!("{} of {} messages failed", failed, total))
        } else {
            None
        },
        provider: provider.to_string(),
        cost: (delivered > 0).then(|| unit_cost * delivered as f64),
        language: request.language.clone(),
        content: request.message.clone(),
    }
}

pub(crate) fn base_url<'a>(config: &'a ProviderConfig, default: &'a str) -> &'a str {
    config
        .api_base_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
}
