//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）与按配置选择后端

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError};

/// Gemini 的 OpenAI 兼容端点
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// 根据配置与环境变量选择 LLM 后端（Gemini / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.timeouts.request;

    match provider.as_str() {
        "gemini" => match std::env::var("GEMINI_API_KEY") {
            Ok(key) => {
                let base = cfg.llm.base_url.as_deref().unwrap_or(GEMINI_OPENAI_BASE_URL);
                tracing::info!("Using Gemini LLM ({})", cfg.llm.model);
                Arc::new(OpenAiClient::new(Some(base), &cfg.llm.model, Some(&key), timeout))
            }
            Err(_) => {
                tracing::warn!("GEMINI_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        "openai" => match std::env::var("OPENAI_API_KEY") {
            Ok(key) => {
                tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
                Arc::new(OpenAiClient::new(
                    cfg.llm.base_url.as_deref(),
                    &cfg.llm.model,
                    Some(&key),
                    timeout,
                ))
            }
            Err(_) => {
                tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        "mock" => Arc::new(MockLlmClient),
        other => {
            tracing::warn!("Unknown LLM provider '{}', using Mock LLM", other);
            Arc::new(MockLlmClient)
        }
    }
}
