use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use std::borrow::Cow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Sqlite,
    Postgres,
}

pub fn db_kind_from_url(url: &str) -> DbKind {
    let lower = url.to_lowercase();
    if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        DbKind::Postgres
    } else {
        DbKind::Sqlite
    }
}

pub fn rewrite_sql<'a>(sql: &'a str, kind: DbKind) -> Cow<'a, str> {
    match kind {
        DbKind::Sqlite => Cow::Borrowed(sql),
        DbKind::Postgres => {
            let mut out = String::with_capacity(sql.len() + 8);
            let mut idx = 1;
            for ch in sql.chars() {
                if ch == '?' {
                    out.push('$');
                    out.push_str(&idx.to_string());
                    idx += 1;
                } else {
                    out.push(ch);
                }
            }
            Cow::Owned(out)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationLogRecord {
    pub id: String,
    pub organization_id: Option<String>,
    pub phone_number: String,
    pub content: String,
    pub message_type: String,
    pub language: String,
    pub direction: String,
    pub status: String,
    pub external_id: Option<String>,
    pub error_message: Option<String>,
    pub provider: String,
    pub cost: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    pub template_key: String,
    pub language: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationSmsSettings {
    pub id: String,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_phone_numbers: Vec<String>,
    pub sms_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContactRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub phone: String,
    pub is_active: bool,
    pub sms_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogCounts {
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
}

fn i64_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

fn datetime_to_i64(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

// Stored as a JSON array; a bare comma list is tolerated.
pub fn parse_phone_numbers(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Vec::new();
    };
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return list
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
    }
    raw.split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

pub async fn init_db(pool: &AnyPool, kind: DbKind) -> Result<()> {
    let stmts = vec![
        r#"CREATE TABLE IF NOT EXISTS sms_communications (
            id TEXT PRIMARY KEY,
            organization_id TEXT,
            phone_number TEXT NOT NULL,
            content TEXT NOT NULL,
            message_type TEXT NOT NULL,
            language TEXT NOT NULL,
            direction TEXT NOT NULL,
            status TEXT NOT NULL,
            external_id TEXT,
            error_message TEXT,
            provider TEXT NOT NULL,
            cost DOUBLE PRECISION,
            created_at BIGINT NOT NULL
        )"#,
        r#"CREATE INDEX IF NOT EXISTS idx_sms_communications_org ON sms_communications(organization_id, created_at)"#,
        r#"CREATE TABLE IF NOT EXISTS sms_templates (
            id TEXT PRIMARY KEY,
            template_key TEXT NOT NULL,
            language TEXT NOT NULL,
            content TEXT NOT NULL,
            UNIQUE(template_key, language)
        )"#,
        r#"CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            twilio_account_sid TEXT,
            twilio_auth_token TEXT,
            twilio_phone_numbers TEXT,
            sms_enabled BIGINT NOT NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS emergency_contacts (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            is_active BIGINT NOT NULL,
            sms_enabled BIGINT NOT NULL,
            created_at BIGINT NOT NULL
        )"#,
        r#"CREATE INDEX IF NOT EXISTS idx_emergency_contacts_org ON emergency_contacts(organization_id, created_at)"#,
    ];

    for stmt in stmts {
        let sql = rewrite_sql(stmt, kind);
        sqlx::query(sql.as_ref()).execute(pool).await?;
    }

    Ok(())
}

pub async fn insert_communication_log(
    pool: &AnyPool,
    kind: DbKind,
    record: &CommunicationLogRecord,
) -> Result<()> {
    let sql = rewrite_sql(
        r#"INSERT INTO sms_communications (
            id, organization_id, phone_number, content, message_type, language, direction,
            status, external_id, error_message, provider, cost, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        kind,
    );
    sqlx::query(sql.as_ref())
        .bind(&record.id)
        .bind(record.organization_id.as_deref())
        .bind(&record.phone_number)
        .bind(&record.content)
        .bind(&record.message_type)
        .bind(&record.language)
        .bind(&record.direction)
        .bind(&record.status)
        .bind(record.external_id.as_deref())
        .bind(record.error_message.as_deref())
        .bind(&record.provider)
        .bind(record.cost)
        .bind(datetime_to_i64(record.created_at))
        .execute(pool)
        .await?;
    Ok(())
}

// The Any driver cannot decode SQL NULL into Option<T>, so nullable columns
// are selected through COALESCE and mapped back here.
fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn log_from_row(row: &AnyRow) -> Result<CommunicationLogRecord> {
    let created_at: i64 = row.try_get("created_at")?;
    let has_cost: i64 = row.try_get("has_cost")?;
    let cost: f64 = row.try_get("cost")?;
    Ok(CommunicationLogRecord {
        id: row.try_get("id")?,
        organization_id: non_empty(row.try_get("organization_id")?),
        phone_number: row.try_get("phone_number")?,
        content: row.try_get("content")?,
        message_type: row.try_get("message_type")?,
        language: row.try_get("language")?,
        direction: row.try_get("direction")?,
        status: row.try_get("status")?,
        external_id: non_empty(row.try_get("external_id")?),
        error_message: non_empty(row.try_get("error_message")?),
        provider: row.try_get("provider")?,
        cost: (has_cost != 0).then_some(cost),
        created_at: i64_to_datetime(created_at),
    })
}

pub async fn list_communication_logs(
    pool: &AnyPool,
    kind: DbKind,
    organization_id: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<CommunicationLogRecord>> {
    let rows = match organization_id {
        Some(org) => {
            let sql = rewrite_sql(
                r#"SELECT id, COALESCE(organization_id, '') AS organization_id, phone_number, content,
                          message_type, language, direction, status,
                          COALESCE(external_id, '') AS external_id,
                          COALESCE(error_message, '') AS error_message, provider,
                          CAST(CASE WHEN cost IS NULL THEN 0 ELSE 1 END AS BIGINT) AS has_cost,
                          COALESCE(cost, 0.0) AS cost, created_at
                   FROM sms_communications WHERE organization_id = ?
                   ORDER BY created_at DESC LIMIT ? OFFSET ?"#,
                kind,
            );
            sqlx::query(sql.as_ref())
                .bind(org)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = rewrite_sql(
                r#"SELECT id, COALESCE(organization_id, '') AS organization_id, phone_number, content,
                          message_type, language, direction, status,
                          COALESCE(external_id, '') AS external_id,
                          COALESCE(error_message, '') AS error_message, provider,
                          CAST(CASE WHEN cost IS NULL THEN 0 ELSE 1 END AS BIGINT) AS has_cost,
                          COALESCE(cost, 0.0) AS cost, created_at
                   FROM sms_communications ORDER BY created_at DESC LIMIT ? OFFSET ?"#,
                kind,
            );
            sqlx::query(sql.as_ref())
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(log_from_row).collect()
}

pub async fn count_communication_logs(pool: &AnyPool) -> Result<LogCounts> {
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM sms_communications")
        .fetch_one(pool)
        .await?;
    let sent = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(1) FROM sms_communications WHERE status = 'sent'",
    )
    .fetch_one(pool)
    .await?;
    Ok(LogCounts {
        total,
        sent,
        failed: total - sent,
    })
}

pub async fn get_template(
    pool: &AnyPool,
    kind: DbKind,
    template_key: &str,
    language: &str,
) -> Result<Option<TemplateRecord>> {
    let sql = rewrite_sql(
        "SELECT id, template_key, language, content FROM sms_templates WHERE template_key = ? AND language = ?",
        kind,
    );
    let row = sqlx::query(sql.as_ref())
        .bind(template_key)
        .bind(language)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = row {
        return Ok(Some(TemplateRecord {
            id: row.try_get("id")?,
            template_key: row.try_get("template_key")?,
            language: row.try_get("language")?,
            content: row.try_get("content")?,
        }));
    }
    Ok(None)
}

pub async fn upsert_template(
    pool: &AnyPool,
    kind: DbKind,
    template_key: &str,
    language: &str,
    content: &str,
) -> Result<TemplateRecord> {
    let record = TemplateRecord {
        id: Uuid::new_v4().to_string(),
        template_key: template_key.to_string(),
        language: language.to_string(),
        content: content.to_string(),
    };
    let sql = rewrite_sql(
        r#"INSERT INTO sms_templates (id, template_key, language, content) VALUES (?, ?, ?, ?)
           ON CONFLICT(template_key, language) DO UPDATE SET content=excluded.content"#,
        kind,
    );
    sqlx::query(sql.as_ref())
        .bind(&record.id)
        .bind(&record.template_key)
        .bind(&record.language)
        .bind(&record.content)
        .execute(pool)
        .await?;
    Ok(record)
}

pub async fn get_organization_sms_settings(
    pool: &AnyPool,
    kind: DbKind,
    organization_id: &str,
) -> Result<Option<OrganizationSmsSettings>> {
    let sql = rewrite_sql(
        r#"SELECT id, COALESCE(twilio_account_sid, '') AS twilio_account_sid,
                  COALESCE(twilio_auth_token, '') AS twilio_auth_token,
                  COALESCE(twilio_phone_numbers, '') AS twilio_phone_numbers, sms_enabled
           FROM organizations WHERE id = ?"#,
        kind,
    );
    let row = sqlx::query(sql.as_ref())
        .bind(organization_id)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = row {
        let numbers: String = row.try_get("twilio_phone_numbers")?;
        let enabled: i64 = row.try_get("sms_enabled")?;
        return Ok(Some(OrganizationSmsSettings {
            id: row.try_get("id")?,
            twilio_account_sid: non_empty(row.try_get("twilio_account_sid")?),
            twilio_auth_token: non_empty(row.try_get("twilio_auth_token")?),
            twilio_phone_numbers: parse_phone_numbers(Some(numbers.as_str())),
            sms_enabled: enabled != 0,
        }));
    }
    Ok(None)
}

pub async fn upsert_organization_sms_settings(
    pool: &AnyPool,
    kind: DbKind,
    settings: &OrganizationSmsSettings,
) -> Result<()> {
    let sql = rewrite_sql(
        r#"INSERT INTO organizations (id, twilio_account_sid, twilio_auth_token, twilio_phone_numbers, sms_enabled)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT(id) DO UPDATE SET
               twilio_account_sid=excluded.twilio_account_sid,
               twilio_auth_token=excluded.twilio_auth_token,
               twilio_phone_numbers=excluded.twilio_phone_numbers,
               sms_enabled=excluded.sms_enabled"#,
        kind,
    );
    sqlx::query(sql.as_ref())
        .bind(&settings.id)
        .bind(settings.twilio_account_sid.as_deref())
        .bind(settings.twilio_auth_token.as_deref())
        .bind(serde_json::to_string(&settings.twilio_phone_numbers)?)
        .bind(settings.sms_enabled as i64)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_emergency_contact(
    pool: &AnyPool,
    kind: DbKind,
    contact: &EmergencyContactRecord,
) -> Result<()> {
    let sql = rewrite_sql(
        r#"INSERT INTO emergency_contacts (id, organization_id, name, phone, is_active, sms_enabled, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        kind,
    );
    sqlx::query(sql.as_ref())
        .bind(&contact.id)
        .bind(&contact.organization_id)
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(contact.is_active as i64)
        .bind(contact.sms_enabled as i64)
        .bind(datetime_to_i64(Utc::now()))
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_sms_emergency_contacts(
    pool: &AnyPool,
    kind: DbKind,
    organization_id: &str,
) -> Result<Vec<EmergencyContactRecord>> {
    let sql = rewrite_sql(
        r#"SELECT id, organization_id, name, phone, is_active, sms_enabled
           FROM emergency_contacts
           WHERE organization_id = ? AND is_active = 1 AND sms_enabled = 1
           ORDER BY created_at ASC, id ASC"#,
        kind,
    );
    let rows = sqlx::query(sql.as_ref())
        .bind(organization_id)
        .fetch_all(pool)
        .await?;

    let mut result = Vec::new();
    for row in rows {
        let is_active: i64 = row.try_get("is_active")?;
        let sms_enabled: i64 = row.try_get("sms_enabled")?;
        result.push(EmergencyContactRecord {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            is_active: is_active != 0,
            sms_enabled: sms_enabled != 0,
        });
    }
    Ok(result)
}
