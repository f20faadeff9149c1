use crate::db::{self, CommunicationLogRecord, DbKind};
use crate::types::{Recipient, SendRequest, SendResult};
use chrono::Utc;
use sqlx::AnyPool;
use uuid::Uuid;

pub fn message_type(request: &SendRequest) -> String {
    request
        .template_key
        .clone()
        .or_else(|| request.metadata_str("type").map(|s| s.to_string()))
        .unwrap_or_else(|| "custom".to_string())
}

pub fn build_log_records(
    recipients: &[Recipient],
    request: &SendRequest,
    result: &SendResult,
    provider: &str,
) -> Vec<CommunicationLogRecord> {
    let fallback_org = request.metadata_str("organization_id").map(|s| s.to_string());
    let message_type = message_type(request);
    let now = Utc::now();

    recipients
        .iter()
        .map(|recipient| CommunicationLogRecord {
            id: Uuid::new_v4().to_string(),
            organization_id: recipient
                .organization_id
                .clone()
                .or_else(|| fallback_org.clone()),
            phone_number: recipient.phone.clone(),
            content: result.content.clone(),
            message_type: message_type.clone(),
            language: result.language.clone(),
            direction: "outbound".to_string(),
            status: if result.success { "sent" } else { "failed" }.to_string(),
            external_id: result.message_id.clone(),
            error_message: result.error.clone(),
            provider: provider.to_string(),
            cost: result.cost,
            created_at: now,
        })
        .collect()
}

// Write errors are logged and never reach the caller.
pub async fn log_communication(
    pool: &AnyPool,
    kind: DbKind,
    recipients: &[Recipient],
    request: &SendRequest,
    result: &SendResult,
    provider: &str,
) {
    for record in build_log_records(recipients, request, result, provider) {
        if let Err(err) = db::insert_communication_log(pool, kind, &record).await {
            tracing::error!(
                phone = %record.phone_number,
                provider,
                "failed to write sms communication log: {err:?}"
            );
        }
    }
}
