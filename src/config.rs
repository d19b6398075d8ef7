//! Environment-driven configuration.

use anyhow::{bail, Context};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub nats_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse()
            .context("PORT must be a number")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            bail!("JWT_SECRET must be at least 32 characters");
        }
        let nats_url = std::env::var("NATS_URL").ok();
        Ok(Self {
            database_url,
            port,
            jwt_secret,
            nats_url,
        })
    }
}
