//! Unified OpenAI-compatible provider.
//!
//! One struct serves both `/embeddings` and `/chat/completions` for every
//! OpenAI-compatible API. Providers differ only by endpoint URL, auth style
//! and API key. No retries: the first failure is returned to the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use ragbot_core::config::LlmConfig;
use ragbot_core::error::{FailureReason, RagBotError, Result};
use ragbot_core::traits::{ChatProvider, EmbeddingProvider, GenerateParams};
use ragbot_core::types::{ChatResponse, Message, Usage};

use crate::provider_registry::{AuthStyle, ProviderConfig};

/// A unified provider that works with any OpenAI-compatible API.
pub struct OpenAiCompatibleProvider {
    /// Provider name (e.g., "openai", "mistral", "ollama").
    name: String,
    /// API key for authentication.
    api_key: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    base_url: String,
    /// Path for chat completions (e.g., "/chat/completions").
    chat_path: String,
    /// Path for embeddings (e.g., "/embeddings").
    embeddings_path: String,
    /// Authentication style.
    auth_style: AuthStyle,
    /// HTTP client.
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiCompatibleProvider {
    /// Create from a known provider config + LLM settings.
    ///
    /// Resolution order:
    /// - API key: `llm.api_key` > the provider's own env vars
    /// - Base URL: `llm.endpoint` > env override > registry default
    pub fn from_registry(registry: &ProviderConfig, llm: &LlmConfig) -> Result<Self> {
        Self::from_registry_with_env(registry, llm, |key| std::env::var(key).ok())
    }

    /// [`from_registry`](Self::from_registry) reading the environment through `env`.
    ///
    /// Fails with `ApiKeyMissing` when the provider needs a key and none resolves.
    pub fn from_registry_with_env(
        registry: &ProviderConfig,
        llm: &LlmConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_key = registry.resolve_api_key(&llm.api_key, &env);
        if registry.requires_api_key() && api_key.is_empty() {
            return Err(RagBotError::ApiKeyMissing(registry.name.to_string()));
        }

        let base_url = if !llm.endpoint.is_empty() {
            llm.endpoint.trim_end_matches('/').to_string()
        } else {
            registry
                .base_url_env
                .and_then(|env_key| {
                    let val = env(env_key).filter(|v| !v.trim().is_empty())?;
                    // For OLLAMA_HOST / LLAMACPP_HOST, append /v1 if not present
                    if val.ends_with("/v1") {
                        Some(val)
                    } else {
                        Some(format!("{}/v1", val.trim_end_matches('/')))
                    }
                })
                .unwrap_or_else(|| registry.base_url.to_string())
        };

        Ok(Self {
            name: registry.name.to_string(),
            api_key,
            base_url,
            chat_path: registry.chat_path.to_string(),
            embeddings_path: registry.embeddings_path.to_string(),
            auth_style: registry.auth_style,
            client: build_client(llm.request_timeout_secs)?,
        })
    }

    /// Create for a custom endpoint (e.g., "custom:https://my-server.com/v1").
    pub fn custom(endpoint: &str, llm: &LlmConfig) -> Result<Self> {
        let base_url = endpoint
            .strip_prefix("custom:")
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();

        let api_key = if !llm.api_key.is_empty() {
            llm.api_key.clone()
        } else {
            std::env::var("CUSTOM_API_KEY").unwrap_or_default()
        };

        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Ok(Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            chat_path: "/chat/completions".to_string(),
            embeddings_path: "/embeddings".to_string(),
            auth_style,
            client: build_client(llm.request_timeout_secs)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the auth header for the request.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    /// POST a JSON body and return the decoded JSON answer.
    ///
    /// `fail` shapes every failure into the caller's error kind.
    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        fail: fn(FailureReason, String) -> RagBotError,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            fail(
                FailureReason::Network,
                format!("{} connection failed ({}): {}", self.name, url, e),
            )
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(fail(
                FailureReason::from_status(status.as_u16()),
                format!("{} API error {}: {}", self.name, status, text),
            ));
        }

        resp.json::<Value>().await.map_err(|e| {
            fail(
                FailureReason::Malformed,
                format!("{} returned invalid JSON: {}", self.name, e),
            )
        })
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(timeout_secs));
    }
    builder
        .build()
        .map_err(|e| RagBotError::Other(format!("HTTP client init failed: {e}")))
}

fn embedding_failure(reason: FailureReason, detail: String) -> RagBotError {
    RagBotError::embedding(reason, detail)
}

fn completion_failure(reason: FailureReason, detail: String) -> RagBotError {
    RagBotError::completion(reason, detail)
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": model,
            "input": text,
        });
        let json = self
            .post_json(&self.embeddings_path, &body, embedding_failure)
            .await?;

        let parsed: EmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            RagBotError::embedding(
                FailureReason::Malformed,
                format!("{} embedding payload: {}", self.name, e),
            )
        })?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                RagBotError::embedding(FailureReason::Malformed, "empty embedding response")
            })?;
        if embedding.is_empty() {
            return Err(RagBotError::embedding(
                FailureReason::Malformed,
                "provider returned a zero-length embedding",
            ));
        }

        tracing::debug!("🧭 Embedded query with {} ({} dims)", model, embedding.len());
        Ok(embedding)
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[Message], params: &GenerateParams) -> Result<ChatResponse> {
        // Build request body — standard OpenAI format
        let mut body = json!({
            "model": params.model,
            "temperature": params.temperature,
            "messages": messages,
        });
        if let Some(max_tokens) = params.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let json = self
            .post_json(&self.chat_path, &body, completion_failure)
            .await?;

        let choice = json["choices"].get(0).ok_or_else(|| {
            RagBotError::completion(FailureReason::Malformed, "No choices in response")
        })?;

        let content = choice["message"]["content"].as_str().map(String::from);

        let usage = json["usage"].as_object().map(|u| Usage {
            prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            completion_tokens: u
                .get("completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        });

        Ok(ChatResponse {
            content,
            finish_reason: choice["finish_reason"].as_str().map(String::from),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_registry::get_provider_config;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn env_of(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    fn provider_for(server: &MockServer) -> OpenAiCompatibleProvider {
        let llm = LlmConfig {
            api_key: "sk-test".into(),
            ..LlmConfig::default()
        };
        OpenAiCompatibleProvider::custom(&format!("custom:{}/v1/", server.uri()), &llm).unwrap()
    }

    #[tokio::test]
    async fn test_embed_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "text-embedding-ada-002",
                "input": "Who won Best Actor?"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "embedding": [0.5, -0.25, 1.0], "index": 0 }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let vector = provider
            .embed("Who won Best Actor?", "text-embedding-ada-002")
            .await
            .unwrap();
        assert_eq!(vector, vec![0.5, -0.25, 1.0]);
    }

    #[tokio::test]
    async fn test_embed_empty_data_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let err = provider_for(&server).embed("q", "m").await.unwrap_err();
        assert!(matches!(
            err,
            RagBotError::Embedding { reason: FailureReason::Malformed, .. }
        ));
    }

    #[tokio::test]
    async fn test_embed_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = provider_for(&server).embed("q", "m").await.unwrap_err();
        assert!(matches!(
            err,
            RagBotError::Embedding { reason: FailureReason::Unauthorized, .. }
        ));
    }

    #[tokio::test]
    async fn test_chat_success_sends_messages_and_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "temperature": 0.0,
                "messages": [
                    { "role": "system", "content": "You answer questions." },
                    { "role": "user", "content": "prompt" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "My Fair Lady" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13 }
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let messages = [Message::system("You answer questions."), Message::user("prompt")];
        let resp = provider
            .chat(&messages, &GenerateParams::deterministic("gpt-3.5-turbo"))
            .await
            .unwrap();
        assert_eq!(resp.content.as_deref(), Some("My Fair Lady"));
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 13);
    }

    #[tokio::test]
    async fn test_chat_empty_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .chat(&[Message::user("q")], &GenerateParams::deterministic("m"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagBotError::Completion { reason: FailureReason::Malformed, .. }
        ));
    }

    #[tokio::test]
    async fn test_chat_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .chat(&[Message::user("q")], &GenerateParams::deterministic("m"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagBotError::Completion { reason: FailureReason::RateLimited, ref detail } if detail.contains("slow down")
        ));
    }

    #[tokio::test]
    async fn test_chat_invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .chat(&[Message::user("q")], &GenerateParams::deterministic("m"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagBotError::Completion { reason: FailureReason::Malformed, .. }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let llm = LlmConfig {
            api_key: "sk-test".into(),
            ..LlmConfig::default()
        };
        let provider =
            OpenAiCompatibleProvider::custom("custom:http://127.0.0.1:9/v1", &llm).unwrap();
        let err = provider
            .chat(&[Message::user("q")], &GenerateParams::deterministic("m"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagBotError::Completion { reason: FailureReason::Network, .. }
        ));
    }

    #[test]
    fn test_custom_endpoint_trims_slash() {
        let provider =
            OpenAiCompatibleProvider::custom("custom:http://localhost:1234/v1/", &LlmConfig::default())
                .unwrap();
        assert_eq!(provider.base_url(), "http://localhost:1234/v1");
    }

    #[test]
    fn test_registry_key_from_provider_env() {
        let registry = get_provider_config("mistral").unwrap();
        let llm = LlmConfig {
            provider: "mistral".into(),
            ..LlmConfig::default()
        };
        let provider = OpenAiCompatibleProvider::from_registry_with_env(
            registry,
            &llm,
            env_of(&[("MISTRAL_API_KEY", "msk-mistral")]),
        )
        .unwrap();
        assert_eq!(provider.api_key, "msk-mistral");
        assert_eq!(provider.base_url(), "https://api.mistral.ai/v1");
    }

    #[test]
    fn test_registry_key_missing() {
        let registry = get_provider_config("mistral").unwrap();
        let llm = LlmConfig {
            provider: "mistral".into(),
            ..LlmConfig::default()
        };
        let result = OpenAiCompatibleProvider::from_registry_with_env(
            registry,
            &llm,
            env_of(&[("OPENAI_API_KEY", "sk-openai")]),
        );
        assert!(matches!(result, Err(RagBotError::ApiKeyMissing(name)) if name == "mistral"));
    }

    #[test]
    fn test_local_provider_host_override() {
        let registry = get_provider_config("ollama").unwrap();
        let llm = LlmConfig {
            provider: "ollama".into(),
            ..LlmConfig::default()
        };
        let provider = OpenAiCompatibleProvider::from_registry_with_env(
            registry,
            &llm,
            env_of(&[("OLLAMA_HOST", "http://gpu-box:11434/")]),
        )
        .unwrap();
        assert_eq!(provider.base_url(), "http://gpu-box:11434/v1");
    }

    #[tokio::test]
    async fn test_openai_key_not_sent_to_other_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer msk-mistral"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "embedding": [1.0, 0.0], "index": 0 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let llm = LlmConfig {
            provider: "mistral".into(),
            endpoint: format!("{}/v1", server.uri()),
            ..LlmConfig::default()
        };
        let provider = OpenAiCompatibleProvider::from_registry_with_env(
            get_provider_config("mistral").unwrap(),
            &llm,
            env_of(&[
                ("OPENAI_API_KEY", "sk-openai-secret"),
                ("MISTRAL_API_KEY", "msk-mistral"),
            ]),
        )
        .unwrap();

        let vector = provider.embed("q", "mistral-embed").await.unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
    }
}
