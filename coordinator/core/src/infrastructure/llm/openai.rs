// OpenAI Oracle Adapter
//
// Anti-Corruption Layer for the OpenAI API
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, etc.)

use crate::domain::oracle::{DecisionOracle, OracleError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct OpenAIOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

impl OpenAIOracle {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl DecisionOracle for OpenAIOracle {
    async fn decide(
        &self,
        system_instruction: &str,
        history: &str,
    ) -> Result<String, OracleError> {
        // Translate our domain call into OpenAI's chat shape
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: system_instruction.to_string(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: history.to_string(),
                },
            ],
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Provider(format!("Failed to parse response: {}", e)))?;

        Ok(openai_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<(), OracleError> {
        let url = format!("{}/models", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(OracleError::Authentication("Invalid API key".into()))
        } else {
            Err(OracleError::Network(format!("HTTP {}", response.status())))
        }
    }
}
