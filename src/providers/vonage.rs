use super::{aggregate_outcomes, base_url, ProviderError, RecipientOutcome, SmsProvider};
use crate::phone::format_phone_number;
use crate::types::{ProviderConfig, ProviderName, Recipient, SendRequest, SendResult};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

pub const VONAGE_API_BASE: &str = "https://rest.nexmo.com";
pub const VONAGE_COST_PER_MESSAGE: f64 = 0.005;

#[derive(Clone)]
pub struct VonageProvider {
    client: Client,
}

impl VonageProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

// Vonage wants E.164 digits without the leading `+`.
pub fn vonage_number(phone: &str) -> String {
    format_phone_number(phone).trim_start_matches('+').to_string()
}

pub async fn send_vonage_message(
    client: &Client,
    config: &ProviderConfig,
    from: &str,
    to: &str,
    text: &str,
) -> Result<String, ProviderError> {
    let url = format!("{}/sms/json", base_url(config, VONAGE_API_BASE));

    let resp = client
        .post(&url)
        .form(&[
            ("api_key", config.api_key.as_str()),
            ("api_secret", config.api_secret.as_str()),
            ("from", from),
            ("to", to),
            ("text", text),
        ])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Vendor(format!(
            "vonage request failed with status {}: {}",
            status, body
        )));
    }

    let value: Value = resp.json().await?;
    let first = value
        .get("messages")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| ProviderError::Vendor(format!("vonage response missing messages: {}", value)))?;

    if first.get("status").and_then(|v| v.as_str()) != Some("0") {
        let text = first
            .get("error-text")
            .and_then(|v| v.as_str())
            .unwrap_or("vonage send failed");
        return Err(ProviderError::Vendor(text.to_string()));
    }

    first
        .get("message-id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::Vendor("vonage response missing message-id".to_string()))
}

#[async_trait]
impl SmsProvider for VonageProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Vonage
    }

    async fn send(
        &self,
        config: &ProviderConfig,
        recipients: &[Recipient],
        request: &SendRequest,
    ) -> Result<SendResult> {
        let from = request.from.as_deref().unwrap_or(config.phone_number.as_str());
        let mut outcomes = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let phone = vonage_number(&recipient.phone);
            let result =
                send_vonage_message(&self.client, config, from, &phone, &request.message).await;
            outcomes.push(RecipientOutcome { phone, result });
        }
        Ok(aggregate_outcomes(
            ProviderName::Vonage,
            VONAGE_COST_PER_MESSAGE,
            outcomes,
            request,
        ))
    }
}
