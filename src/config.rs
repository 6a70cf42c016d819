use anyhow::{Context, Result};
use config::Config;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "VQ";

/// Runtime settings, read from `VQ_*` environment variables on top of defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub json_path: String,
    pub start_url: String,
    pub user_agent: String,
    pub vision_endpoint: String,
    pub vision_api_key: Option<String>,
    pub vision_access_token: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Config::builder().add_source(config::Environment::with_prefix(ENV_PREFIX)),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .set_default("db_path", "data/quotes.sqlite")?
            .set_default("json_path", "data/css-scraper-results.json")?
            .set_default("start_url", "https://quotes.toscrape.com/page/1/")?
            .set_default("user_agent", concat!("vision_quotes/", env!("CARGO_PKG_VERSION")))?
            .set_default("vision_endpoint", "https://vision.googleapis.com")?
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Failed to read settings")
    }
}
