use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// Direct (server-to-server) gateway endpoint.
    pub gateway_post_url: String,
    /// Hosted-page gateway endpoint.
    pub gateway_hosted_url: String,
    pub gateway_username: Option<String>,
    pub gateway_password: Option<String>,
    pub hosted_user_id: Option<String>,
    pub hosted_key: Option<String>,
    /// Base URL this deployment is reachable on; the hosted-flow callback
    /// endpoint is resolved against it.
    pub public_base_url: String,
    /// Receipt from-address. Leaving it unset disables receipts.
    pub receipt_from: Option<String>,
    /// Overrides the store's native unit-of-work capability when set.
    pub use_transactional_writes: Option<bool>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            gateway_post_url: env::var("GATEWAY_POST_URL")?,
            gateway_hosted_url: env::var("GATEWAY_HOSTED_URL")?,
            gateway_username: env::var("GATEWAY_USERNAME").ok(),
            gateway_password: env::var("GATEWAY_PASSWORD").ok(),
            hosted_user_id: env::var("HOSTED_USER_ID").ok(),
            hosted_key: env::var("HOSTED_KEY").ok(),
            public_base_url: env::var("PUBLIC_BASE_URL")?,
            receipt_from: env::var("RECEIPT_FROM").ok(),
            use_transactional_writes: match env::var("USE_TRANSACTIONAL_WRITES") {
                Ok(raw) => Some(parse_bool(&raw)?),
                Err(_) => None,
            },
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("USE_TRANSACTIONAL_WRITES must be a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool(" Yes ").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("sometimes").is_err());
    }
}
