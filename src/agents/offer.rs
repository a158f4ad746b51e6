//! InterviewOffer：处理对「是否进行评分访谈」的回答

use std::sync::Arc;

use async_trait::async_trait;

use super::StepHandler;
use crate::classifier::schemas::{OfferDecision, OfferResponse};
use crate::classifier::{classify, Classifier};
use crate::core::error::HandlerFault;
use crate::core::state::{SessionState, StatePatch, Step};

pub const INTERVIEW_START: &str = "Ótimo! Vamos começar a entrevista. Vou te fazer algumas perguntas.";
pub const OFFER_DECLINED: &str = "Sem problemas. Se precisar de mais alguma coisa, como consultar seu limite atual \
    ou ver taxas de câmbio, é só pedir.";
pub const OFFER_UNCLEAR: &str =
    "Desculpe, não entendi. Você gostaria de fazer a entrevista para tentar aumentar seu limite? (Sim/Não)";

pub struct InterviewOfferAgent {
    classifier: Arc<dyn Classifier>,
}

impl InterviewOfferAgent {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl StepHandler for InterviewOfferAgent {
    fn step(&self) -> Step {
        Step::InterviewOffer
    }

    async fn handle(&self, state: &SessionState) -> Result<StatePatch, HandlerFault> {
        let text = state.last_user_text();
        let decision = match classify::<OfferResponse>(self.classifier.as_ref(), text).await {
            Ok(response) => response.decision,
            Err(e) => {
                tracing::warn!("Offer response classification failed, treating as unclear: {}", e);
                OfferDecision::Unclear
            }
        };

        Ok(match decision {
            // 访谈在本轮内立即提出第一题
            OfferDecision::Accept => StatePatch::handoff(Step::InterviewAgent)
                .say(INTERVIEW_START)
                .interview(0, Vec::new()),
            OfferDecision::Decline => StatePatch::end_turn(Step::Triage).say(OFFER_DECLINED),
            OfferDecision::Unclear => StatePatch::end_turn(Step::InterviewOffer).say(OFFER_UNCLEAR),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::authenticated_state;
    use crate::classifier::StubClassifier;
    use crate::core::state::Route;
    use serde_json::json;

    fn agent(classifier: StubClassifier) -> InterviewOfferAgent {
        InterviewOfferAgent::new(Arc::new(classifier))
    }

    #[tokio::test]
    async fn test_accept_hands_off_within_turn() {
        let agent = agent(StubClassifier::new().on::<OfferResponse>(|_| json!({"decision": "ACCEPT"})));
        let patch = agent
            .handle(&authenticated_state(Step::InterviewOffer, "bora"))
            .await
            .unwrap();

        assert_eq!(patch.next_step, Route::Step(Step::InterviewAgent));
        assert_eq!(patch.active_step, Step::InterviewAgent);
        assert_eq!(patch.interview_progress, Some(0));
    }

    #[tokio::test]
    async fn test_decline_returns_to_triage() {
        let agent = agent(StubClassifier::new().on::<OfferResponse>(|_| json!({"decision": "DECLINE"})));
        let patch = agent
            .handle(&authenticated_state(Step::InterviewOffer, "agora não"))
            .await
            .unwrap();
        assert_eq!(patch.messages[0].content, OFFER_DECLINED);
        assert_eq!(patch.next_step, Route::End);
        assert_eq!(patch.active_step, Step::Triage);
    }

    #[tokio::test]
    async fn test_classifier_failure_is_unclear() {
        let agent = agent(StubClassifier::new().failing::<OfferResponse>());
        let patch = agent
            .handle(&authenticated_state(Step::InterviewOffer, "???"))
            .await
            .unwrap();
        assert_eq!(patch.messages[0].content, OFFER_UNCLEAR);
        assert_eq!(patch.active_step, Step::InterviewOffer);
    }
}
