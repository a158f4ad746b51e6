//! 分类器：外部语言模型的窄能力接口
//!
//! 业务逻辑只通过 `classify::<T>(classifier, input)` 取得结构化猜测，或通过 `generate` 取得自由文本；
//! 分类器是易错、非确定的外部协作者，所有失败都以 ClassifyError 返回，由调用点按各自默认值恢复。
//! 测试用 StubClassifier 替换，得到确定性行为。

pub mod llm;
pub mod schemas;
pub mod stub;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::llm::LlmError;

pub use llm::LlmClassifier;
pub use stub::StubClassifier;

/// 分类失败（超时、输出格式错误、不符合 schema）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("llm failure: {0}")]
    Llm(#[from] LlmError),

    #[error("malformed classifier output: {0}")]
    Malformed(String),

    #[error("output does not match schema {schema}: {message}")]
    Schema {
        schema: &'static str,
        message: String,
    },

    #[error("no scripted answer for schema {0}")]
    Unscripted(String),
}

/// 分类目标：名称、任务指令与可由 schemars 渲染的结构
pub trait Schema: DeserializeOwned + JsonSchema {
    const NAME: &'static str;

    fn instructions() -> &'static str;
}

/// 单次分类请求（schema 已渲染为 JSON Schema 文本）
#[derive(Debug, Clone)]
pub struct ClassifyRequest<'a> {
    pub schema_name: &'static str,
    pub instructions: &'a str,
    pub schema_json: String,
    pub input: &'a str,
}

/// 分类器能力接口
#[async_trait]
pub trait Classifier: Send + Sync {
    /// 返回符合请求 schema 的 JSON 值（尚未反序列化）
    async fn classify_raw(&self, request: &ClassifyRequest<'_>) -> Result<Value, ClassifyError>;

    /// 按指令生成一段面向用户的自由文本
    async fn generate(&self, instructions: &str, input: &str) -> Result<String, ClassifyError>;
}

/// 结构化分类：渲染 T 的 JSON Schema，请求分类器并反序列化结果
pub async fn classify<T: Schema>(classifier: &dyn Classifier, input: &str) -> Result<T, ClassifyError> {
    let schema = schemars::schema_for!(T);
    let schema_json =
        serde_json::to_string(&schema).map_err(|e| ClassifyError::Malformed(e.to_string()))?;
    let request = ClassifyRequest {
        schema_name: T::NAME,
        instructions: T::instructions(),
        schema_json,
        input,
    };

    let value = classifier.classify_raw(&request).await?;
    serde_json::from_value(value).map_err(|e| ClassifyError::Schema {
        schema: T::NAME,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::schemas::{CreditAction, CreditIntent, ExitIntent};
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_classify_deserializes_scripted_value() {
        let stub = StubClassifier::new().on::<CreditIntent>(|_| {
            json!({"intent": "REQUEST_INCREASE", "value": 3000.0})
        });

        let intent: CreditIntent = classify(&stub, "quero 3000").await.unwrap();
        assert_eq!(intent.intent, CreditAction::RequestIncrease);
        assert_eq!(intent.value, Some(3000.0));
    }

    #[tokio::test]
    async fn test_classify_reports_schema_violation() {
        let stub = StubClassifier::new().on::<ExitIntent>(|_| json!({"exit": "maybe"}));

        let err = classify::<ExitIntent>(&stub, "hm").await.unwrap_err();
        assert!(matches!(err, ClassifyError::Schema { schema: "exit_intent", .. }));
    }
}
