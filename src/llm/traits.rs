//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：给定系统指令与用户输入，返回一段完成文本。

use async_trait::async_trait;
use thiserror::Error;

/// LLM 调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("empty completion")]
    EmptyResponse,
}

/// LLM 客户端 trait：单轮（system + user）非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// 后端名称，用于日志
    fn name(&self) -> &str {
        "llm"
    }
}
