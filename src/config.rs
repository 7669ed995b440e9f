use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub audience: Option<String>,
}

/// Model gateway settings. The key is optional at startup; a missing key is
/// reported per generation request.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub ai: AiConfig,
    pub storage: StorageConfig,
}

pub const DEFAULT_AI_API_URL: &str = "https://api.openrouter.ai/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "gpt-3.5-turbo";

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            audience: optional("JWT_AUDIENCE"),
        };
        let ai = AiConfig {
            api_url: optional("AI_API_URL").unwrap_or_else(|| DEFAULT_AI_API_URL.into()),
            api_key: optional("AI_API_KEY"),
            model: optional("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.into()),
            timeout_secs: std::env::var("AI_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };
        let endpoint = required("S3_ENDPOINT")?;
        let storage = StorageConfig {
            bucket: optional("S3_BUCKET").unwrap_or_else(|| "public".into()),
            access_key: required("S3_ACCESS_KEY")?,
            secret_key: required("S3_SECRET_KEY")?,
            region: optional("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            public_url: optional("S3_PUBLIC_URL").unwrap_or_else(|| endpoint.clone()),
            endpoint,
        };
        Ok(Self {
            database_url,
            jwt,
            ai,
            storage,
        })
    }
}
