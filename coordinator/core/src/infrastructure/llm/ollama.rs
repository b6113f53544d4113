// Ollama Oracle Adapter
//
// Anti-Corruption Layer for Ollama local models
// Supports air-gapped deployments with local LLMs

use crate::domain::oracle::{DecisionOracle, OracleError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct OllamaOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

impl OllamaOracle {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl DecisionOracle for OllamaOracle {
    async fn decide(
        &self,
        system_instruction: &str,
        history: &str,
    ) -> Result<String, OracleError> {
        let request = OllamaRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system_instruction.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: history.to_string(),
                },
            ],
            stream: false,
        };

        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 404 {
                OracleError::ModelNotFound(self.model.clone())
            } else {
                OracleError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Provider(format!("Failed to parse response: {}", e)))?;

        Ok(ollama_response.message.content)
    }

    async fn health_check(&self) -> Result<(), OracleError> {
        let url = format!("{}/api/tags", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(OracleError::Network(format!("HTTP {}", response.status())))
        }
    }
}
