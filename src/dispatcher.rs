use crate::communication_log::log_communication;
use crate::config::Config;
use crate::db::{self, DbKind};
use crate::providers::{default_adapters, SmsProvider};
use crate::registry::resolve_providers;
use crate::template::{render_template, substitute_variables};
use crate::types::{
    ProviderConfig, ProviderName, Recipient, Recipients, SendRequest, SendResult,
    TemplateSendRequest,
};
use anyhow::Result;
use serde_json::json;
use sqlx::AnyPool;
use std::sync::Arc;

// Attributed to failures when no provider was available to try.
pub const FALLBACK_PROVIDER: ProviderName = ProviderName::Twilio;
pub const EXHAUSTED_ERROR: &str = "All SMS providers failed";
pub const EMERGENCY_MESSAGE_TYPE: &str = "emergency_broadcast";

#[derive(Clone)]
pub struct Dispatcher {
    pool: AnyPool,
    db_kind: DbKind,
    config: Config,
    adapters: Vec<Arc<dyn SmsProvider>>,
}

impl Dispatcher {
    pub fn new(pool: AnyPool, db_kind: DbKind, config: Config, http: reqwest::Client) -> Self {
        Self::with_adapters(pool, db_kind, config, default_adapters(http))
    }

    pub fn with_adapters(
        pool: AnyPool,
        db_kind: DbKind,
        config: Config,
        adapters: Vec<Arc<dyn SmsProvider>>,
    ) -> Self {
        Self {
            pool,
            db_kind,
            config,
            adapters,
        }
    }

    pub async fn send_sms(
        &self,
        mut request: SendRequest,
        preferred: Option<ProviderName>,
    ) -> SendResult {
        if request.language.trim().is_empty() {
            request.language = self.config.dispatch.default_language.clone();
        }

        let recipients = request.to.to_vec();
        if recipients.is_empty() {
            return SendResult::failure(FALLBACK_PROVIDER.as_str(), "No recipients provided", &request);
        }

        let organization_id = organization_id_for(&recipients, &request);
        let providers = match resolve_providers(
            &self.pool,
            self.db_kind,
            &self.config,
            organization_id.as_deref(),
        )
        .await
        {
            Ok(list) => list,
            Err(err) => {
                tracing::error!("sms provider resolution failed: {err:?}");
                let result =
                    SendResult::failure(FALLBACK_PROVIDER.as_str(), err.to_string(), &request);
                self.log(&recipients, &request, &result).await;
                return result;
            }
        };

        let ordered = order_providers(providers, preferred.or(request.provider));
        let result = run_fallback_chain(&self.adapters, &ordered, &recipients, &request).await;
        self.log(&recipients, &request, &result).await;
        result
    }

    pub async fn send_template_sms(&self, params: TemplateSendRequest) -> SendResult {
        let language = if params.language.trim().is_empty() {
            self.config.dispatch.default_language.clone()
        } else {
            params.language.clone()
        };

        let mut request = SendRequest::new(params.to, String::new());
        request.template_key = Some(params.template_key.clone());
        request.language = language.clone();
        request.from = params.from;
        if let Some(org) = params.organization_id {
            request
                .metadata
                .insert("organization_id".to_string(), json!(org));
        }

        let template =
            match render_template(&self.pool, self.db_kind, &params.template_key, &language).await {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(template_key = %params.template_key, %language, "{err}");
                    return SendResult::failure(FALLBACK_PROVIDER.as_str(), err.to_string(), &request);
                }
            };

        request.message = substitute_variables(&template, &params.variables);
        self.send_sms(request, params.provider).await
    }

    pub async fn send_emergency_broadcast(
        &self,
        organization_id: &str,
        message: &str,
    ) -> Result<Vec<SendResult>> {
        let contacts =
            db::list_sms_emergency_contacts(&self.pool, self.db_kind, organization_id).await?;
        tracing::info!(
            organization_id,
            contacts = contacts.len(),
            "sending emergency broadcast"
        );

        let mut results = Vec::with_capacity(contacts.len());
        for contact in contacts {
            let recipient = Recipient {
                phone: contact.phone,
                name: Some(contact.name),
                organization_id: Some(organization_id.to_string()),
            };
            let mut request = SendRequest::new(Recipients::One(recipient), message);
            request
                .metadata
                .insert("type".to_string(), json!(EMERGENCY_MESSAGE_TYPE));
            request
                .metadata
                .insert("organization_id".to_string(), json!(organization_id));
            results.push(self.send_sms(request, None).await);
        }
        Ok(results)
    }

    async fn log(&self, recipients: &[Recipient], request: &SendRequest, result: &SendResult) {
        log_communication(
            &self.pool,
            self.db_kind,
            recipients,
            request,
            result,
            &result.provider,
        )
        .await;
    }
}

pub fn organization_id_for(recipients: &[Recipient], request: &SendRequest) -> Option<String> {
    recipients
        .iter()
        .find_map(|r| r.organization_id.clone().filter(|id| !id.trim().is_empty()))
        .or_else(|| request.metadata_str("organization_id").map(|s| s.to_string()))
}

pub fn order_providers(
    mut providers: Vec<ProviderConfig>,
    preferred: Option<ProviderName>,
) -> Vec<ProviderConfig> {
    if let Some(name) = preferred {
        if let Some(pos) = providers.iter().position(|p| p.name == name) {
            let chosen = providers.remove(pos);
            providers.insert(0, chosen);
        }
    }
    providers
}

pub async fn run_fallback_chain(
    adapters: &[Arc<dyn SmsProvider>],
    providers: &[ProviderConfig],
    recipients: &[Recipient],
    request: &SendRequest,
) -> SendResult {
    let mut last_error: Option<String> = None;
    let mut last_provider = FALLBACK_PROVIDER;

    for provider in providers {
        last_provider = provider.name;
        let Some(adapter) = adapters.iter().find(|a| a.name() == provider.name) else {
            tracing::warn!(provider = %provider.name, "no adapter registered");
            last_error = Some(format!("no adapter registered for {}", provider.name));
            continue;
        };

        tracing::info!(
            provider = %provider.name,
            recipients = recipients.len(),
            "attempting sms send"
        );
        match adapter.send(provider, recipients, request).await {
            Ok(result) if result.success => {
                tracing::info!(
                    provider = %provider.name,
                    message_id = result.message_id.as_deref().unwrap_or_default(),
                    "sms sent"
                );
                return result;
            }
            Ok(result) => {
                let error = result
                    .error
                    .unwrap_or_else(|| format!("{} send failed", provider.name));
                tracing::warn!(provider = %provider.name, "sms provider failed: {error}");
                last_error = Some(error);
            }
            Err(err) => {
                tracing::warn!(provider = %provider.name, "sms provider error: {err:?}");
                last_error = Some(err.to_string());
            }
        }
    }

    let error = last_error.unwrap_or_else(|| EXHAUSTED_ERROR.to_string());
    tracing::error!(provider = %last_provider, "all sms providers failed: {error}");
    SendResult::failure(last_provider.as_str(), error, request)
}
