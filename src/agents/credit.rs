//! Credit：查询额度与提额申请

use std::sync::Arc;

use async_trait::async_trait;

use super::{authenticated, brl, closing_patch, is_exit, StepHandler};
use crate::bank::{LimitDecision, LimitService};
use crate::classifier::schemas::{CreditAction, CreditIntent};
use crate::classifier::{classify, Classifier};
use crate::core::error::HandlerFault;
use crate::core::state::{SessionState, StatePatch, Step};

pub const ASK_AMOUNT: &str = "Qual o valor do novo limite que você deseja?";
pub const CREDIT_MENU: &str = "Posso consultar seu limite atual ou dar entrada em um pedido de aumento. \
    O que você prefere fazer agora?";
const INTERVIEW_PITCH: &str =
    "Gostaria de realizar uma entrevista para atualizar seu perfil e tentar melhorar seu score?";

fn current_limit_message(limit: f64) -> String {
    format!(
        "Seu limite de crédito atual é de {}.\n\n\
         Posso te ajudar com mais alguma coisa? Se quiser, podemos ver um aumento de limite, \
         consultar taxas de câmbio ou encerrar o atendimento por aqui.",
        brl(limit)
    )
}

fn approved_message(requested: f64) -> String {
    format!(
        "Parabéns! Seu aumento para {} foi aprovado!\n\n\
         Posso ajudar em algo mais? Fique à vontade para pedir cotações de moedas ou qualquer outra informação.",
        brl(requested)
    )
}

fn rejected_message(decision: &LimitDecision) -> String {
    match decision.max_allowed {
        Some(max) => format!(
            "Infelizmente seu pedido foi negado. Seu score atual é {}, o que permite um limite máximo de {}.\n\n{}",
            decision.score,
            brl(max),
            INTERVIEW_PITCH
        ),
        None => format!(
            "Infelizmente seu pedido foi negado. Seu score atual é {}, e no momento não há um limite \
             disponível para essa faixa de score.\n\n{}",
            decision.score, INTERVIEW_PITCH
        ),
    }
}

pub struct CreditAgent {
    classifier: Arc<dyn Classifier>,
    limits: LimitService,
}

impl CreditAgent {
    pub fn new(classifier: Arc<dyn Classifier>, limits: LimitService) -> Self {
        Self { classifier, limits }
    }
}

#[async_trait]
impl StepHandler for CreditAgent {
    fn step(&self) -> Step {
        Step::CreditAgent
    }

    async fn handle(&self, state: &SessionState) -> Result<StatePatch, HandlerFault> {
        let text = state.last_user_text();
        if is_exit(self.classifier.as_ref(), text).await {
            return Ok(closing_patch());
        }
        let customer = authenticated(state, Step::CreditAgent)?;

        let intent = match classify::<CreditIntent>(self.classifier.as_ref(), text).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!("Credit intent classification failed, asking again: {}", e);
                CreditIntent {
                    intent: CreditAction::Other,
                    value: None,
                }
            }
        };

        match intent.intent {
            CreditAction::CheckLimit => {
                let limit = self.limits.current_limit(&customer.tax_id).await?;
                Ok(StatePatch::end_turn(Step::Triage).say(current_limit_message(limit)))
            }
            CreditAction::RequestIncrease => {
                let Some(requested) = intent.value.filter(|v| v.is_finite() && *v > 0.0) else {
                    return Ok(StatePatch::end_turn(Step::CreditAgent).say(ASK_AMOUNT));
                };
                let decision = self
                    .limits
                    .request_increase(&customer.tax_id, requested)
                    .await?;
                if decision.approved() {
                    Ok(StatePatch::end_turn(Step::Triage).say(approved_message(requested)))
                } else {
                    Ok(StatePatch::end_turn(Step::InterviewOffer).say(rejected_message(&decision)))
                }
            }
            CreditAction::Other => Ok(StatePatch::end_turn(Step::CreditAgent).say(CREDIT_MENU)),
        }
    }
}
