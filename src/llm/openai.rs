//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；Gemini、OpenAI、自建代理均可。
//! 温度固定为 0，分类结果尽量稳定；每次请求带超时，超时按 LlmError::Timeout 返回。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt_tokens, completion_tokens, total_tokens)
    pub fn get(&self) -> (u64, u64, u64) {
        let prompt = self.prompt_tokens.load(Ordering::Relaxed);
        let completion = self.completion_tokens.load(Ordering::Relaxed);
        (prompt, completion, prompt + completion)
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名，complete 时组装 system + user 并取首条 content
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    timeout_secs: u64,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>, timeout_secs: u64) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            timeout_secs,
            usage: TokenUsage::default(),
        }
    }

    fn build_messages(system: &str, user: &str) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system.to_string())
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(user.to_string())
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        Ok(vec![
            ChatCompletionRequestMessage::System(system),
            ChatCompletionRequestMessage::User(user),
        ])
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(0.0)
            .messages(Self::build_messages(system, user)?)
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.client.chat().create(request),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.timeout_secs))?
        .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
            let (prompt, completion, total) = self.usage.get();
            tracing::debug!(model = %self.model, prompt, completion, total, "Cumulative token usage");
        }

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_accumulates() {
        let usage = TokenUsage::default();
        usage.add(120, 8);
        usage.clone().add(30, 2);
        assert_eq!(usage.get(), (150, 10, 160));
    }

    #[test]
    fn test_name_is_model() {
        let client = OpenAiClient::new(Some("http://localhost:1"), "gemini-2.0-flash-lite", Some("k"), 5);
        assert_eq!(client.name(), "gemini-2.0-flash-lite");
    }
}
