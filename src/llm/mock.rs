//! Mock LLM 客户端（离线运行，无需 API）
//!
//! 总是返回空 JSON 对象：结构化分类因缺字段失败，各调用点走各自的默认值；
//! 自由文本生成则得到一句固定回复。适合本地跑通流程。

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};

#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Ok("{}".to_string())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
