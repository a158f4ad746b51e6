//! 基于 LLM 的分类器实现
//!
//! 将任务指令与 JSON Schema 拼入 system prompt，要求模型只输出一个 JSON 对象；
//! 输出可能带 Markdown 代码块或前后说明文字，解析时截取第一个 `{` 到最后一个 `}`。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{ClassifyError, ClassifyRequest, Classifier};
use crate::llm::LlmClient;

pub struct LlmClassifier {
    llm: Arc<dyn LlmClient>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 底层 LLM 后端名称
    pub fn backend(&self) -> &str {
        self.llm.name()
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify_raw(&self, request: &ClassifyRequest<'_>) -> Result<Value, ClassifyError> {
        let system = format!(
            "{}\n\nResponda APENAS com um objeto JSON válido que siga este JSON Schema, sem texto adicional:\n{}",
            request.instructions, request.schema_json
        );

        let raw = self.llm.complete(&system, request.input).await?;
        tracing::debug!(
            schema = request.schema_name,
            backend = self.llm.name(),
            "classifier output: {}",
            raw
        );
        extract_json_object(&raw)
    }

    async fn generate(&self, instructions: &str, input: &str) -> Result<String, ClassifyError> {
        let text = self.llm.complete(instructions, input).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ClassifyError::Malformed("empty generation".to_string()));
        }
        Ok(text.to_string())
    }
}

/// 从模型输出中截取并解析 JSON 对象
pub(crate) fn extract_json_object(raw: &str) -> Result<Value, ClassifyError> {
    let start = raw
        .find('{')
        .ok_or_else(|| ClassifyError::Malformed(format!("no JSON object in: {}", raw)))?;
    let end = raw
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| ClassifyError::Malformed(format!("unterminated JSON object in: {}", raw)))?;

    let value: Value = serde_json::from_str(&raw[start..=end])
        .map_err(|e| ClassifyError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ClassifyError::Malformed("top-level value is not an object".to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::classifier::schemas::{ExitIntent, GreetingIntent};
    use crate::llm::{LlmError, MockLlmClient};

    struct FixedLlm(Result<String, LlmError>);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_extract_json_from_fenced_block() {
        let raw = "```json\n{\"is_exit\": true}\n```";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["is_exit"], Value::Bool(true));
    }

    #[test]
    fn test_extract_json_rejects_prose() {
        assert!(matches!(
            extract_json_object("sim, o cliente quer sair"),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_llm_classifier_parses_structured_output() {
        let classifier = LlmClassifier::new(Arc::new(FixedLlm(Ok(
            "Claro! {\"is_greeting\": false}".to_string()
        ))));
        let result: GreetingIntent = classify(&classifier, "quero meu limite").await.unwrap();
        assert!(!result.is_greeting);
    }

    #[tokio::test]
    async fn test_llm_timeout_surfaces_as_classify_error() {
        let classifier = LlmClassifier::new(Arc::new(FixedLlm(Err(LlmError::Timeout(30)))));
        let err = classify::<ExitIntent>(&classifier, "tchau").await.unwrap_err();
        assert_eq!(err, ClassifyError::Llm(LlmError::Timeout(30)));
    }

    #[test]
    fn test_backend_name_comes_from_client() {
        assert_eq!(LlmClassifier::new(Arc::new(MockLlmClient)).backend(), "mock");
        assert_eq!(LlmClassifier::new(Arc::new(FixedLlm(Err(LlmError::EmptyResponse)))).backend(), "llm");
    }

    #[tokio::test]
    async fn test_mock_llm_yields_schema_error() {
        let classifier = LlmClassifier::new(Arc::new(MockLlmClient));
        let err = classify::<ExitIntent>(&classifier, "tchau").await.unwrap_err();
        assert!(matches!(err, ClassifyError::Schema { .. }));
    }
}
