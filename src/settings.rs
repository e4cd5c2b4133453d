use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "thread_digest";

/// Runtime settings: optional `thread_digest.toml`, then `DIGEST_*` env vars.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: String,
    /// Summary providers in fallback order.
    pub providers: Vec<String>,
    pub openai_model: String,
    pub mistral_model: String,
    pub request_timeout_secs: u64,
    pub scrape_concurrency: usize,
    pub max_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: "data/threads.sqlite".to_string(),
            providers: vec!["mistral".to_string(), "openai".to_string()],
            openai_model: "gpt-3.5-turbo".to_string(),
            mistral_model: "mistral-tiny".to_string(),
            request_timeout_secs: 60,
            scrape_concurrency: 10,
            max_retries: 3,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Settings> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix("DIGEST")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("providers"),
            );
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Settings> {
        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        if settings.scrape_concurrency == 0 {
            anyhow::bail!("scrape_concurrency must be at least 1");
        }
        Ok(settings)
    }
}
