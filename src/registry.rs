use crate::config::{Config, ProviderCredentials, ProvidersConfig};
use crate::db::{self, DbKind, OrganizationSmsSettings};
use crate::types::{ProviderConfig, ProviderName};
use anyhow::Result;
use sqlx::AnyPool;

fn provider_from_credentials(name: ProviderName, creds: &ProviderCredentials) -> ProviderConfig {
    let enabled = !creds.api_key.trim().is_empty()
        && !creds.api_secret.trim().is_empty()
        && !creds.phone_number.trim().is_empty();
    ProviderConfig {
        name,
        api_key: creds.api_key.clone(),
        api_secret: creds.api_secret.clone(),
        phone_number: creds.phone_number.clone(),
        priority: creds.priority,
        enabled,
        api_base_url: creds.api_base_url.clone(),
    }
}

pub fn default_providers(providers: &ProvidersConfig) -> Vec<ProviderConfig> {
    let mut list: Vec<ProviderConfig> = [
        provider_from_credentials(ProviderName::Twilio, &providers.twilio),
        provider_from_credentials(ProviderName::Vonage, &providers.vonage),
    ]
    .into_iter()
    .filter(|p| p.enabled)
    .collect();
    list.sort_by_key(|p| p.priority);
    list
}

pub fn organization_providers(
    settings: &OrganizationSmsSettings,
    platform: &ProvidersConfig,
) -> Option<Vec<ProviderConfig>> {
    if !settings.sms_enabled {
        return None;
    }
    let sid = settings.twilio_account_sid.as_deref()?.trim();
    let token = settings.twilio_auth_token.as_deref()?.trim();
    let number = settings.twilio_phone_numbers.first()?.trim();
    if sid.is_empty() || token.is_empty() || number.is_empty() {
        return None;
    }

    Some(vec![ProviderConfig {
        name: ProviderName::Twilio,
        api_key: sid.to_string(),
        api_secret: token.to_string(),
        phone_number: number.to_string(),
        priority: 1,
        enabled: true,
        api_base_url: platform.twilio.api_base_url.clone(),
    }])
}

// Lookup errors fall back to platform providers only when fail-open is set.
pub async fn resolve_providers(
    pool: &AnyPool,
    kind: DbKind,
    config: &Config,
    organization_id: Option<&str>,
) -> Result<Vec<ProviderConfig>> {
    let defaults = default_providers(&config.providers);
    let Some(organization_id) = organization_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(defaults);
    };

    match db::get_organization_sms_settings(pool, kind, organization_id).await {
        Ok(Some(settings)) => {
            Ok(organization_providers(&settings, &config.providers).unwrap_or(defaults))
        }
        Ok(None) => Ok(defaults),
        Err(err) if config.dispatch.fail_open_on_org_lookup => {
            tracing::warn!(
                organization_id,
                "organization sms settings lookup failed, using platform providers: {err:?}"
            );
            Ok(defaults)
        }
        Err(err) => Err(err.context(format!(
            "organization sms settings lookup failed for {}",
            organization_id
        ))),
    }
}
