use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use crate::core::config::{HttpSettings, LlmConfig, TokenLimitStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

/// The seam between the orchestration code and the provider. Everything
/// that talks to a model goes through this trait so it can be driven by a
/// scripted double in tests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<String>;
}

pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig, http: &HttpSettings) -> Self {
        let mut builder = Client::builder()
            .timeout(std::time::Duration::from_secs(http.timeout_secs));

        builder = match &http.proxy_url {
            Some(url) => match reqwest::Proxy::all(url) {
                Ok(proxy) => builder.proxy(proxy),
                Err(e) => {
                    log::warn!("Invalid proxy url {}: {}. Proxying disabled.", url, e);
                    builder.no_proxy()
                }
            },
            None => builder.no_proxy(),
        };

        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "top_p": request.top_p,
            "stream": false
        });

        let token_key = match self.config.token_limit_style {
            TokenLimitStyle::MaxTokens => "max_tokens",
            TokenLimitStyle::MaxCompletionTokens => "max_completion_tokens",
        };
        body[token_key] = json!(request.max_output_tokens);
        body
    }

    async fn chat_once(&self, request: &ChatRequest) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        let body = self.request_body(request);

        log::info!("Sending LLM request to {} (model: {})", url, request.model);

        let mut call = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }

        let res = match call.send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Failed to connect to LLM at {}: {}", url, e);
                return Err(anyhow!("LLM connection failed: {}", e));
            }
        };

        if !res.status().is_success() {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            log::error!("LLM error {}: {}", status, error_text);
            return Err(anyhow!("LLM API error {}: {}", status, error_text));
        }

        let response_json: serde_json::Value = res.json().await?;

        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow!("Unexpected LLM response format: {}", response_json))
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    /// All upstream failures are retried identically up to `max_attempts`,
    /// with no delay between attempts.
    async fn chat(&self, request: ChatRequest) -> Result<String> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.chat_once(&request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    log::warn!("LLM call failed (attempt {}/{}): {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        Err(anyhow!(
            "LLM call failed after {} attempts: {}",
            attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        ))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted stand-in for a provider. Pops one step per call; once the
    /// script runs out it repeats the fallback response, if any.
    pub(crate) struct ScriptedModel {
        script: Mutex<VecDeque<Result<String, String>>>,
        fallback: Option<String>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        pub(crate) fn new(steps: Vec<Result<&str, &str>>) -> Self {
            Self {
                script: Mutex::new(
                    steps
                        .into_iter()
                        .map(|s| s.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                fallback: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn always(response: &str) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Some(response.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, _request: ChatRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(anyhow!(message)),
                None => match &self.fallback {
                    Some(text) => Ok(text.clone()),
                    None => Err(anyhow!("scripted model exhausted")),
                },
            }
        }
    }
}
