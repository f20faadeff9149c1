use sms_dispatch::db::{self, DbKind};
use sms_dispatch::template::{render_template, substitute_variables};
use serde_json::{json, Map, Value};
use sqlx::AnyPool;
use tempfile::TempDir;

async fn create_test_pool(temp_dir: &TempDir) -> AnyPool {
    sqlx::any::install_default_drivers();
    let db_path = temp_dir.path().join("templates.db");
    let pool = AnyPool::connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
        .await
        .unwrap();
    db::init_db(&pool, DbKind::Sqlite).await.unwrap();
    pool
}

fn vars(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_render_requested_language() {
    let temp_dir = TempDir::new().unwrap();
    let pool = create_test_pool(&temp_dir).await;
    db::upsert_template(&pool, DbKind::Sqlite, "confirm", "en", "Hi {{name}}").await.unwrap();
    db::upsert_template(&pool, DbKind::Sqlite, "confirm", "es", "Hola {{name}}").await.unwrap();

    let content = render_template(&pool, DbKind::Sqlite, "confirm", "es").await.unwrap();
    assert_eq!(content, "Hola {{name}}");
}

#[tokio::test]
async fn test_render_falls_back_to_english() {
    let temp_dir = TempDir::new().unwrap();
    let pool = create_test_pool(&temp_dir).await;
    db::upsert_template(
        &pool,
        DbKind::Sqlite,
        "confirm",
        "en",
        "Hi {{name}}, your {{service}} is booked",
    )
    .await
    .unwrap();

    let content = render_template(&pool, DbKind::Sqlite, "confirm", "es").await.unwrap();
    let rendered = substitute_variables(&content, &vars(json!({"name": "Ana", "service": "repair"})));
    assert_eq!(rendered, "Hi Ana, your repair is booked");
}

#[tokio::test]
async fn test_render_missing_template() {
    let temp_dir = TempDir::new().unwrap();
    let pool = create_test_pool(&temp_dir).await;

    let err = render_template(&pool, DbKind::Sqlite, "welcome", "fr").await.unwrap_err();
    assert_eq!(err.to_string(), "Template not found: welcome");
}

#[tokio::test]
async fn test_upsert_replaces_content() {
    let temp_dir = TempDir::new().unwrap();
    let pool = create_test_pool(&temp_dir).await;
    db::upsert_template(&pool, DbKind::Sqlite, "reminder", "en", "old").await.unwrap();
    db::upsert_template(&pool, DbKind::Sqlite, "reminder", "en", "new").await.unwrap();

    let content = render_template(&pool, DbKind::Sqlite, "reminder", "en").await.unwrap();
    assert_eq!(content, "new");
}

#[test]
fn test_whitespace_inside_braces_is_not_matched() {
    let out = substitute_variables("Hi {{ name }}", &vars(json!({"name": "Ana"})));
    assert_eq!(out, "Hi {{ name }}");
}

#[test]
fn test_null_value_renders_as_null() {
    let out = substitute_variables("Note: {{note}}", &vars(json!({"note": null})));
    assert_eq!(out, "Note: null");
}
