use crate::db::{self, DbKind};
use crate::types::DEFAULT_LANGUAGE;
use anyhow::Result;
use serde_json::{Map, Value};
use sqlx::AnyPool;

pub async fn render_template(
    pool: &AnyPool,
    kind: DbKind,
    template_key: &str,
    language: &str,
) -> Result<String> {
    if let Some(template) = db::get_template(pool, kind, template_key, language).await? {
        return Ok(template.content);
    }

    if language != DEFAULT_LANGUAGE {
        tracing::debug!(template_key, language, "template missing, falling back to english");
        if let Some(template) = db::get_template(pool, kind, template_key, DEFAULT_LANGUAGE).await? {
            return Ok(template.content);
        }
    }

    Err(anyhow::anyhow!("Template not found: {}", template_key))
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn substitute_variables(template: &str, variables: &Map<String, Value>) -> String {
    let mut out = template.to_string();
    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        out = out.replace(&placeholder, &value_to_text(value));
    }
    out
}
