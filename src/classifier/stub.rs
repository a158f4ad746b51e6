//! 确定性分类器桩（用于测试，无需 LLM）
//!
//! 按 schema 名注册规则：输入文本 -> JSON 值；未注册的 schema 返回 ClassifyError::Unscripted，
//! 相当于一次分类失败，调用点走自己的默认值。记录每个 schema 的调用次数，便于断言「未调用分类器」。

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{ClassifyError, ClassifyRequest, Classifier, Schema};

type Rule = Box<dyn Fn(&str) -> Result<Value, ClassifyError> + Send + Sync>;

#[derive(Default)]
pub struct StubClassifier {
    rules: HashMap<&'static str, Rule>,
    reply: Option<String>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 schema T 注册规则
    pub fn on<T: Schema>(mut self, rule: impl Fn(&str) -> Value + Send + Sync + 'static) -> Self {
        self.rules.insert(T::NAME, Box::new(move |input| Ok(rule(input))));
        self
    }

    /// schema T 的每次分类都失败
    pub fn failing<T: Schema>(mut self) -> Self {
        self.rules.insert(
            T::NAME,
            Box::new(|_| Err(ClassifyError::Malformed("scripted failure".to_string()))),
        );
        self
    }

    /// generate 的固定回复；未设置时 generate 失败
    pub fn with_reply(mut self, text: impl Into<String>) -> Self {
        self.reply = Some(text.into());
        self
    }

    /// schema 被调用的次数
    pub fn calls(&self, schema_name: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(schema_name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn record(&self, name: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(name.to_string()).or_insert(0) += 1;
        }
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify_raw(&self, request: &ClassifyRequest<'_>) -> Result<Value, ClassifyError> {
        self.record(request.schema_name);
        match self.rules.get(request.schema_name) {
            Some(rule) => rule(request.input),
            None => Err(ClassifyError::Unscripted(request.schema_name.to_string())),
        }
    }

    async fn generate(&self, _instructions: &str, _input: &str) -> Result<String, ClassifyError> {
        self.record("generate");
        self.reply
            .clone()
            .ok_or_else(|| ClassifyError::Unscripted("generate".to_string()))
    }
}
