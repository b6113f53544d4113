// Anthropic Oracle Adapter
//
// Anti-Corruption Layer for the Anthropic Claude API

use crate::domain::oracle::{DecisionOracle, OracleError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct AnthropicOracle {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    system: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

impl AnthropicOracle {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens: 512,
        }
    }
}

#[async_trait]
impl DecisionOracle for AnthropicOracle {
    async fn decide(
        &self,
        system_instruction: &str,
        history: &str,
    ) -> Result<String, OracleError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            system: system_instruction.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: history.to_string(),
            }],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                OracleError::Authentication(error_text)
            } else if status == 429 {
                OracleError::RateLimit
            } else if status == 404 {
                OracleError::ModelNotFound(self.model.clone())
            } else {
                OracleError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Provider(format!("Failed to parse response: {}", e)))?;

        Ok(anthropic_response
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<(), OracleError> {
        // Anthropic has no models list endpoint; a GET against the
        // messages endpoint validates authentication (405 expected).
        let response = self
            .client
            .get("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        if response.status().is_success()
            || response.status() == 404
            || response.status() == 405
        {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(OracleError::Authentication("Invalid API key".into()))
        } else {
            Err(OracleError::Network(format!("HTTP {}", response.status())))
        }
    }
}
