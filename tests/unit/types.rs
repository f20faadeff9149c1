use sms_dispatch::types::{
    ProviderName, Recipient, Recipients, SendRequest, SendResult, TemplateSendRequest,
};
use serde_json::json;

#[test]
fn test_provider_name_serde_lowercase() {
    assert_eq!(serde_json::to_value(ProviderName::Twilio).unwrap(), json!("twilio"));
    let parsed: ProviderName = serde_json::from_value(json!("vonage")).unwrap();
    assert_eq!(parsed, ProviderName::Vonage);
    assert!(serde_json::from_value::<ProviderName>(json!("Plivo")).is_err());
}

#[test]
fn test_recipients_normalize_to_list() {
    let one = Recipients::One(Recipient::new("5551234567"));
    assert_eq!(one.into_vec().len(), 1);

    let many = Recipients::Many(vec![Recipient::new("5551234567"), Recipient::new("5557654321")]);
    let list = many.to_vec();
    assert_eq!(list[1].phone, "5557654321");
}

#[test]
fn test_send_request_defaults() {
    let req: SendRequest = serde_json::from_value(json!({
        "to": {"phone": "5551234567"},
        "message": "Reminder: appointment tomorrow"
    }))
    .unwrap();
    assert!(req.from.is_none());
    assert!(req.provider.is_none());
    assert!(req.template_key.is_none());
    assert_eq!(req.language, "en");
}

#[test]
fn test_template_send_request_defaults() {
    let req: TemplateSendRequest = serde_json::from_value(json!({
        "template_key": "confirm",
        "to": [{"phone": "5551234567", "organization_id": "org_1"}]
    }))
    .unwrap();
    assert_eq!(req.language, "en");
    assert!(req.variables.is_empty());
    assert!(req.organization_id.is_none());
}

#[test]
fn test_send_result_serializes_all_fields() {
    let result = SendResult {
        success: true,
        message_id: Some("SM1".to_string()),
        error: None,
        provider: "twilio".to_string(),
        cost: Some(0.0075),
        language: "en".to_string(),
        content: "hi".to_string(),
    };
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["message_id"], json!("SM1"));
    assert_eq!(value["error"], json!(null));
    assert_eq!(value["provider"], json!("twilio"));
}
