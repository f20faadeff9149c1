use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Twilio,
    Vonage,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Twilio => "twilio",
            ProviderName::Vonage => "vonage",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "twilio" => Ok(ProviderName::Twilio),
            "vonage" => Ok(ProviderName::Vonage),
            other => Err(anyhow::anyhow!("unknown sms provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub api_key: String,
    pub api_secret: String,
    pub phone_number: String,
    pub priority: i32,
    pub enabled: bool,
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub phone: String,
    pub name: Option<String>,
    pub organization_id: Option<String>,
}

impl Recipient {
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            name: None,
            organization_id: None,
        }
    }
}

// `to` accepts a single recipient or a list on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(Recipient),
    Many(Vec<Recipient>),
}

impl Recipients {
    pub fn into_vec(self) -> Vec<Recipient> {
        match self {
            Recipients::One(recipient) => vec![recipient],
            Recipients::Many(list) => list,
        }
    }

    pub fn to_vec(&self) -> Vec<Recipient> {
        self.clone().into_vec()
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub to: Recipients,
    pub message: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderName>,
    #[serde(default)]
    pub template_key: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SendRequest {
    pub fn new(to: Recipients, message: impl Into<String>) -> Self {
        Self {
            to,
            message: message.into(),
            from: None,
            provider: None,
            template_key: None,
            language: default_language(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub provider: String,
    pub cost: Option<f64>,
    pub language: String,
    pub content: String,
}

impl SendResult {
    pub fn failure(
        provider: impl Into<String>,
        error: impl Into<String>,
        request: &SendRequest,
    ) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            provider: provider.into(),
            cost: None,
            language: request.language.clone(),
            content: request.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSendRequest {
    pub template_key: String,
    pub to: Recipients,
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderName>,
}
