use super::{aggregate_outcomes, base_url, ProviderError, RecipientOutcome, SmsProvider};
use crate::phone::format_phone_number;
use crate::types::{ProviderConfig, ProviderName, Recipient, SendRequest, SendResult};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

pub const TWILIO_API_BASE: &str = "https://api.twilio.com";
pub const TWILIO_COST_PER_MESSAGE: f64 = 0.0075;

#[derive(Clone)]
pub struct TwilioProvider {
    client: Client,
}

impl TwilioProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

pub async fn send_twilio_message(
    client: &Client,
    config: &ProviderConfig,
    from: &str,
    to: &str,
    body: &str,
) -> Result<String, ProviderError> {
    let url = format!(
        "{}/2010-04-01/Accounts/{}/Messages.json",
        base_url(config, TWILIO_API_BASE),
        config.api_key
    );

    let resp = client
        .post(&url)
        .basic_auth(&config.api_key, Some(&config.api_secret))
        .form(&[("To", to), ("From", from), ("Body", body)])
        .send()
        .await?;

    let status = resp.status();
    let value: Value = resp.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        let message = value
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("twilio request failed with status {}", status));
        return Err(ProviderError::Vendor(message));
    }

    value
        .get("sid")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::Vendor(format!("twilio response missing sid: {}", value)))
}

#[async_trait]
impl SmsProvider for TwilioProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Twilio
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
            let phone = format_phone_number(&recipient.phone);
            let result =
                send_twilio_message(&self.client, config, from, &phone, &request.message).await;
            outcomes.push(RecipientOutcome { phone, result });
        }
        Ok(aggregate_outcomes(
            ProviderName::Twilio,
            TWILIO_COST_PER_MESSAGE,
            outcomes,
            request,
        ))
    }
}
