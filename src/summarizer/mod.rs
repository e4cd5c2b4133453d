//! LLM-backed thread summaries with ordered provider fallback.

pub mod bullets;
pub mod chat;
pub mod prompt;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ProviderError, SummaryError};
use crate::parser::thread::ThreadResult;
use crate::settings::Settings;
use chat::ChatProvider;

/// A chat model that turns a prompt into text.
#[async_trait]
pub trait SummaryProvider: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub bullet_points: Vec<String>,
    pub author: String,
    pub post_count: usize,
    pub provider: String,
    pub raw_summary: String,
}

#[derive(Debug)]
pub struct Summarizer {
    providers: Vec<Box<dyn SummaryProvider>>,
}

impl Summarizer {
    pub fn new(providers: Vec<Box<dyn SummaryProvider>>) -> Self {
        Summarizer { providers }
    }

    /// Providers named in `settings.providers` whose API key is present, in order.
    pub fn from_settings(settings: &Settings) -> Result<Self, SummaryError> {
        let mut providers: Vec<Box<dyn SummaryProvider>> = Vec::new();
        for name in &settings.providers {
            match ChatProvider::from_env(name, settings) {
                Ok(p) => {
                    info!("Initialized {} provider ({})", p.name(), p.model());
                    providers.push(Box::new(p));
                }
                Err(e) => warn!("Skipping provider {}: {}", name, e),
            }
        }
        if providers.is_empty() {
            return Err(SummaryError::NoProviders {
                tried: settings.providers.join(", "),
            });
        }
        Ok(Summarizer::new(providers))
    }

    pub async fn summarize(&self, thread: &ThreadResult) -> Result<Summary, SummaryError> {
        if thread.full_text().trim().is_empty() {
            return Err(SummaryError::NoContent);
        }

        let prompt = prompt::build_prompt(thread);
        info!("Summarizing thread with {} posts", thread.total_count());

        let mut last_error = String::from("no providers configured");
        for provider in &self.providers {
            match provider.complete(&prompt).await {
                Ok(raw) => {
                    let raw_summary = raw.trim().to_string();
                    return Ok(Summary {
                        bullet_points: bullets::extract_bullet_points(&raw_summary),
                        author: thread.author().to_string(),
                        post_count: thread.total_count(),
                        provider: provider.name().to_string(),
                        raw_summary,
                    });
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.name(), e);
                    last_error = e.to_string();
                }
            }
        }

        Err(SummaryError::AllProvidersFailed { last: last_error })
    }
}

/// Configured provider names with their model and whether a key is set.
pub fn provider_status(settings: &Settings) -> Vec<(String, String, bool)> {
    settings
        .providers
        .iter()
        .map(|name| {
            let model = match name.to_lowercase().as_str() {
                "openai" => settings.openai_model.clone(),
                "mistral" => settings.mistral_model.clone(),
                _ => "unsupported".to_string(),
            };
            let available = chat::api_key_var(name)
                .and_then(|var| std::env::var(var).ok())
                .is_some_and(|k| !k.trim().is_empty());
            (name.clone(), model, available)
        })
        .collect()
}

// ── Tests ──
