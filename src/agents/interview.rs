//! Interview：五题访谈（逐题校验）与评分
//!
//! interview_progress 为已提出的题数：提出第 k 题后 progress = k，等待第 k 题的回答；
//! 回答有效才推进。五题答完后归一化、计算评分、写回存储，然后把对话交回 credit_agent。

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::{authenticated, closing_patch, is_exit, StepHandler};
use crate::bank::CustomerStore;
use crate::classifier::schemas::{AnswerValidation, InterviewProfile, JobType};
use crate::classifier::{classify, Classifier};
use crate::core::error::HandlerFault;
use crate::core::state::{SessionState, StatePatch, Step};
use crate::observability::mask_tax_id;

pub const QUESTIONS: [&str; 5] = [
    "Qual é a sua renda mensal aproximada?",
    "Qual seu tipo de emprego? (formal, autônomo, desempregado)",
    "Qual o valor das suas despesas fixas mensais?",
    "Quantos dependentes você tem?",
    "Você possui dívidas ativas? (sim/não)",
];

/// 评分计算出错时使用的默认分
pub const DEFAULT_SCORE: u32 = 500;
pub const MAX_SCORE: u32 = 1000;
const INCOME_WEIGHT: f64 = 30.0;
const DEFAULT_FEEDBACK: &str = "Resposta inválida.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("expenses of {0} make the income ratio undefined")]
    ZeroDenominator(f64),

    #[error("score is not a finite number")]
    NonFinite,

    #[error("profile normalization failed: {0}")]
    Normalization(String),
}

fn employment_weight(job_type: JobType) -> f64 {
    match job_type {
        JobType::Formal => 300.0,
        JobType::Autonomous => 200.0,
        JobType::Unemployed | JobType::Unrecognized => 0.0,
    }
}

fn dependents_weight(dependents: i64) -> f64 {
    match dependents {
        0 => 100.0,
        1 => 80.0,
        2 => 60.0,
        _ => 30.0,
    }
}

fn debt_weight(has_debts: bool) -> f64 {
    if has_debts {
        -100.0
    } else {
        100.0
    }
}

/// 确定性评分：向零取整后截断到 [0, 1000]
pub fn compute_score(profile: &InterviewProfile) -> Result<u32, ScoreError> {
    let denominator = profile.expenses + 1.0;
    if denominator == 0.0 {
        return Err(ScoreError::ZeroDenominator(profile.expenses));
    }
    let raw = (profile.income / denominator) * INCOME_WEIGHT
        + employment_weight(profile.job_type)
        + dependents_weight(profile.dependents)
        + debt_weight(profile.has_debts);
    if !raw.is_finite() {
        return Err(ScoreError::NonFinite);
    }
    Ok(raw.trunc().clamp(0.0, MAX_SCORE as f64) as u32)
}

pub fn score_or_default(result: Result<u32, ScoreError>) -> u32 {
    result.unwrap_or_else(|e| {
        tracing::warn!("Score computation failed, using default {}: {}", DEFAULT_SCORE, e);
        DEFAULT_SCORE
    })
}

fn interview_transcript(answers: &[String]) -> String {
    QUESTIONS
        .iter()
        .zip(answers)
        .map(|(q, a)| format!("P: {}\nR: {}\n", q, a))
        .collect()
}

fn completion_message(score: u32) -> String {
    format!(
        "Obrigado! Suas informações foram atualizadas e seu novo score é {}.\n\n\
         Agora, por favor, me diga novamente qual o valor de limite que você gostaria de solicitar \
         para que eu possa fazer uma nova análise.",
        score
    )
}

pub struct InterviewAgent {
    classifier: Arc<dyn Classifier>,
    customers: Arc<dyn CustomerStore>,
}

impl InterviewAgent {
    pub fn new(classifier: Arc<dyn Classifier>, customers: Arc<dyn CustomerStore>) -> Self {
        Self {
            classifier,
            customers,
        }
    }

    fn ask(question_index: usize, answers: Vec<String>) -> StatePatch {
        StatePatch::end_turn(Step::InterviewAgent)
            .say(QUESTIONS[question_index])
            .interview(question_index + 1, answers)
    }

    /// 校验失败时按有效处理，cleaned_value 取原文
    async fn validate(&self, question: &str, answer: &str) -> AnswerValidation {
        let input = format!("PERGUNTA: {}\nRESPOSTA: {}", question, answer);
        match classify::<AnswerValidation>(self.classifier.as_ref(), &input).await {
            Ok(validation) => validation,
            Err(e) => {
                tracing::warn!("Answer validation failed, accepting raw answer: {}", e);
                AnswerValidation {
                    valid: true,
                    feedback: None,
                    cleaned_value: Some(answer.to_string()),
                }
            }
        }
    }

    async fn score(&self, answers: &[String]) -> u32 {
        let transcript = interview_transcript(answers);
        let result = match classify::<InterviewProfile>(self.classifier.as_ref(), &transcript).await {
            Ok(profile) => compute_score(&profile),
            Err(e) => Err(ScoreError::Normalization(e.to_string())),
        };
        score_or_default(result)
    }

    async fn finish(
        &self,
        state: &SessionState,
        answers: Vec<String>,
    ) -> Result<StatePatch, HandlerFault> {
        let customer = authenticated(state, Step::InterviewAgent)?;
        let score = self.score(&answers).await;

        if !self.customers.update_score(&customer.tax_id, score).await? {
            tracing::warn!("Score update found no record for {}", mask_tax_id(&customer.tax_id));
        }
        tracing::info!(score, "Interview finished for {}", mask_tax_id(&customer.tax_id));

        let mut updated = customer.clone();
        updated.score = score;
        Ok(StatePatch::end_turn(Step::CreditAgent)
            .say(completion_message(score))
            .customer(updated)
            .interview(0, Vec::new()))
    }
}

#[async_trait]
impl StepHandler for InterviewAgent {
    fn step(&self) -> Step {
        Step::InterviewAgent
    }

    async fn handle(&self, state: &SessionState) -> Result<StatePatch, HandlerFault> {
        let progress = state.interview_progress;
        if progress == 0 {
            return Ok(Self::ask(0, Vec::new()));
        }

        let text = state.last_user_text();
        if is_exit(self.classifier.as_ref(), text).await {
            return Ok(closing_patch());
        }

        let Some(question) = QUESTIONS.get(progress - 1) else {
            tracing::warn!(progress, "Interview progress out of range, restarting");
            return Ok(Self::ask(0, Vec::new()));
        };

        let validation = self.validate(question, text).await;
        if !validation.valid {
            let feedback = validation
                .feedback
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FEEDBACK.to_string());
            return Ok(StatePatch::end_turn(Step::InterviewAgent)
                .say(format!("{}\n\n{}", feedback, question)));
        }

        let mut answers = state.interview_answers.clone();
        answers.push(validation.cleaned_value.unwrap_or_else(|| text.to_string()));

        if progress < QUESTIONS.len() {
            Ok(Self::ask(progress, answers))
        } else {
            self.finish(state, answers).await
        }
    }
}
