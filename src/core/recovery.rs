//! 错误恢复引擎
//!
//! 把处理器故障转换为统一兜底：由模型生成一条致歉（不含技术细节，提醒重新认证），
//! 生成失败时用固定文本；会话回到 triage 的问候阶段。

use std::sync::Arc;

use crate::classifier::Classifier;
use crate::core::error::HandlerFault;
use crate::core::state::{StatePatch, Step};

pub const FALLBACK_APOLOGY: &str = "Desculpe, estamos enfrentando dificuldades técnicas no momento. \
    Por favor, tente novamente mais tarde. Ao reiniciar o atendimento, será necessário passar pela autenticação novamente.";

const APOLOGY_INSTRUCTIONS: &str = "Você é um assistente bancário virtual prestativo e educado. \
    Ocorreu um erro interno no sistema.\n\
    Explique ao cliente, de forma humana e não técnica, que algo deu errado do nosso lado.\n\
    Peça desculpas e sugira aguardar um momento ou reiniciar o atendimento.\n\
    IMPORTANTE: avise que ao reiniciar será necessário passar pela autenticação novamente.\n\
    Não mencione códigos de erro nem detalhes técnicos.";

pub struct RecoveryEngine {
    classifier: Arc<dyn Classifier>,
}

impl RecoveryEngine {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// 面向用户的致歉文本
    pub async fn apology(&self) -> String {
        match self
            .classifier
            .generate(APOLOGY_INSTRUCTIONS, "Gere a mensagem de erro.")
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Apology generation failed, using fixed text: {}", e);
                FALLBACK_APOLOGY.to_string()
            }
        }
    }

    /// 处理器故障 -> 兜底补丁：致歉、结束本轮、回到未认证问候阶段
    pub async fn fallback_patch(&self, step: Step, fault: &HandlerFault) -> StatePatch {
        tracing::error!(%step, "Handler fault: {}", fault);
        StatePatch::end_turn(Step::Triage)
            .say(self.apology().await)
            .reset_session()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::StubClassifier;
    use crate::core::state::{Route, TriageStage};

    #[tokio::test]
    async fn test_generated_apology_is_used() {
        let engine = RecoveryEngine::new(Arc::new(
            StubClassifier::new().with_reply("Ops! Tivemos um problema."),
        ));
        let patch = engine
            .fallback_patch(Step::CreditAgent, &HandlerFault::Internal("boom".to_string()))
            .await;

        assert_eq!(patch.messages[0].content, "Ops! Tivemos um problema.");
        assert_eq!(patch.next_step, Route::End);
        assert_eq!(patch.active_step, Step::Triage);
        assert_eq!(patch.triage_stage, Some(TriageStage::Greeting));
        assert_eq!(patch.customer, Some(None));
    }

    #[tokio::test]
    async fn test_fixed_apology_when_generation_fails() {
        let engine = RecoveryEngine::new(Arc::new(StubClassifier::new()));
        assert_eq!(engine.apology().await, FALLBACK_APOLOGY);
    }
}
