// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Oracle Provider Registry - Provider Resolution and Management
//
// Manages decision-oracle providers and resolves a configured provider
// name to an adapter. Misconfigured providers are skipped with a warning
// rather than failing registry construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::oracle::DecisionOracle;

use super::anthropic::AnthropicOracle;
use super::ollama::OllamaOracle;
use super::openai::OpenAIOracle;

/// Configuration for one oracle provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleProviderConfig {
    /// Provider handle used for resolution (e.g. "default", "local").
    pub name: String,

    /// Adapter kind: "anthropic", "openai", or "ollama".
    pub provider: String,

    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Registry for managing oracle providers.
pub struct OracleRegistry {
    providers: HashMap<String, Arc<dyn DecisionOracle>>,
}

impl OracleRegistry {
    /// Create an oracle registry from provider configurations.
    pub fn from_configs(configs: &[OracleProviderConfig]) -> anyhow::Result<Self> {
        let mut providers: HashMap<String, Arc<dyn DecisionOracle>> = HashMap::new();

        info!("Initializing oracle provider registry");

        for config in configs {
            if !config.enabled {
                info!("Provider '{}' disabled, skipping", config.name);
                continue;
            }

            info!(
                "Initializing provider: {} ({}: {})",
                config.name, config.provider, config.model
            );

            match Self::create_provider(config) {
                Ok(provider) => {
                    providers.insert(config.name.clone(), provider);
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", config.name, e);
                    // Continue with other providers
                }
            }
        }

        if providers.is_empty() {
            warn!("No oracle providers configured - centralized routing will not be available");
        }

        Ok(Self { providers })
    }

    fn create_provider(config: &OracleProviderConfig) -> anyhow::Result<Arc<dyn DecisionOracle>> {
        match config.provider.as_str() {
            "anthropic" => {
                let api_key = config
                    .api_key
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("anthropic provider requires api_key"))?;
                Ok(Arc::new(AnthropicOracle::new(api_key, config.model.clone())))
            }
            "openai" => {
                let api_key = config
                    .api_key
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("openai provider requires api_key"))?;
                let endpoint = config
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
                Ok(Arc::new(OpenAIOracle::new(
                    endpoint,
                    api_key,
                    config.model.clone(),
                )))
            }
            "ollama" => {
                let endpoint = config
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());
                Ok(Arc::new(OllamaOracle::new(endpoint, config.model.clone())))
            }
            other => Err(anyhow::anyhow!("Unknown oracle provider: {}", other)),
        }
    }

    /// Resolve a provider by handle.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn DecisionOracle>> {
        self.providers.get(name).cloned()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}
