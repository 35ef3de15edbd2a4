//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API
//! (OpenAI itself, vLLM, LocalAI, llama-server, Docker Model Runner).
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::normalize::format_data_mb;
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::{parse_alternative_descriptions, parse_quality_assessment};
use super::types::{
    AlternativeDescription, AlternativeDraft, PackageQualityInput, QualityAssessment,
};
use super::AIBackend;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Use a specific prompt library (tests use embedded prompts only)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create from environment variables
    ///
    /// Required: `OPENAI_COMPATIBLE_HOST`
    /// Optional: `OPENAI_COMPATIBLE_MODEL`, `OPENAI_COMPATIBLE_API_KEY`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model =
            std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let mut backend = Self::new(&host, &model);
        backend.api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        Some(backend)
    }

    /// Render a prompt into (system, user) messages
    fn render(&self, id: PromptId, vars: &HashMap<&str, String>) -> Result<(Option<String>, String)> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::Ai("Failed to acquire prompt library lock".into()))?;
        let prompt = prompts.get(id)?;
        Ok((
            prompt.system_section().map(String::from),
            prompt.render_user(vars),
        ))
    }

    /// Make a chat completion request
    async fn chat_completion(&self, system: Option<String>, user: String) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user,
        });

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.1),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ai(format!("OpenAI API error {}: {}", status, body)));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Ai("No response from OpenAI API".into()))
    }
}

/// Template variables for the quality prompt
pub(crate) fn quality_prompt_vars(input: &PackageQualityInput) -> HashMap<&'static str, String> {
    let mut vars = HashMap::new();
    vars.insert("title", input.title.clone());
    vars.insert("provider", input.provider.clone());
    vars.insert("destination", input.destination.clone());
    vars.insert("data", format_data_mb(input.data_mb));
    vars.insert("validity_days", input.validity_days.to_string());
    vars.insert("voice_minutes", input.voice_minutes.to_string());
    vars.insert("sms_count", input.sms_count.to_string());
    vars.insert("price", format!("{:.2}", input.retail_price));
    vars.insert("currency", input.currency.clone());
    vars.insert(
        "peers",
        input
            .peers
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    vars
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn analyze_package_quality(
        &self,
        input: &PackageQualityInput,
    ) -> Result<QualityAssessment> {
        let (system, user) =
            self.render(PromptId::AnalyzePackageQuality, &quality_prompt_vars(input))?;

        let response = self.chat_completion(system, user).await?;
        debug!("OpenAI-compatible quality response: {}", response);

        parse_quality_assessment(&response)
    }

    async fn describe_alternatives(
        &self,
        target: &str,
        drafts: &[AlternativeDraft],
    ) -> Result<Vec<AlternativeDescription>> {
        let mut vars = HashMap::new();
        vars.insert("target", target.to_string());
        vars.insert(
            "alternatives",
            drafts
                .iter()
                .map(|d| format!("- id {}: {}", d.id, d.summary))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        let (system, user) = self.render(PromptId::DescribeAlternatives, &vars)?;

        let response = self.chat_completion(system, user).await?;
        debug!("OpenAI-compatible descriptions response: {}", response);

        parse_alternative_descriptions(&response)
    }

    async fn health_check(&self) -> bool {
        // Try /v1/models first (standard OpenAI endpoint)
        let mut req = self.http_client.get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        if let Ok(resp) = req.send().await {
            if resp.status().is_success() {
                return true;
            }
        }

        // Try /health (LocalAI, Docker Model Runner)
        matches!(
            self.http_client
                .get(format!("{}/health", self.base_url))
                .send()
                .await,
            Ok(resp) if resp.status().is_success()
        )
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn quality_prompt_version(&self) -> u32 {
        let Ok(mut prompts) = self.prompts.write() else {
            return 0;
        };
        prompts
            .get(PromptId::AnalyzePackageQuality)
            .map(|p| p.metadata.version)
            .unwrap_or(0)
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockOpenAIServer;

    fn input() -> PackageQualityInput {
        PackageQualityInput {
            title: "Japan 1GB 7 Days".into(),
            provider: "eSIM Go".into(),
            destination: "Japan".into(),
            data_mb: Some(1024),
            validity_days: 7,
            retail_price: 3.13,
            currency: "USD".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_quality_prompt_vars() {
        let vars = quality_prompt_vars(&input());
        assert_eq!(vars["data"], "1GB");
        assert_eq!(vars["price"], "3.13");
        assert_eq!(vars["peers"], "");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8080/", "m");
        assert_eq!(backend.host(), "http://localhost:8080");
        assert_eq!(backend.model(), "m");
    }

    #[test]
    fn test_quality_prompt_version_from_frontmatter() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8080", "m")
            .with_prompts(PromptLibrary::embedded_only());
        assert_eq!(backend.quality_prompt_version(), 1);
    }

    #[tokio::test]
    async fn test_against_mock_server() {
        let server = MockOpenAIServer::start().await;
        let backend = OpenAICompatibleBackend::new(&server.url(), "mock-model")
            .with_prompts(PromptLibrary::embedded_only());

        assert!(backend.health_check().await);

        let assessment = backend.analyze_package_quality(&input()).await.unwrap();
        assert!(assessment.quality_score <= 100);
        assert!(assessment.reasoning.is_some());

        let drafts = vec![AlternativeDraft {
            id: 3,
            summary: "Same data, 3 more days".into(),
        }];
        let described = backend
            .describe_alternatives("Japan 1GB 7 days", &drafts)
            .await
            .unwrap();
        assert_eq!(described.len(), 1);
        assert_eq!(described[0].id, 3);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:9", "m");
        assert!(!backend.health_check().await);
        assert!(backend.analyze_package_quality(&input()).await.is_err());
    }
}
