//! Triage：问候、CPF 采集、生日验证、认证后分发
//!
//! 阶段机：greeting -> collect_id -> collect_birthdate -> {authenticated | failed}；
//! 验证失败回到 collect_id（不回 greeting），累计 3 次进入 failed，此后只重复联系客服的提示。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;

use super::{closing_patch, is_exit, StepHandler};
use crate::bank::CustomerStore;
use crate::classifier::schemas::{
    DateExtraction, GreetingIntent, ServiceCategory, TaxIdExtraction, TriageIntent,
};
use crate::classifier::{classify, Classifier};
use crate::core::error::HandlerFault;
use crate::core::state::{SessionState, StatePatch, Step, TriageStage, MAX_AUTH_ATTEMPTS};
use crate::observability::mask_tax_id;

pub const ASK_TAX_ID: &str =
    "Olá! Para que eu possa te ajudar, preciso confirmar seus dados. Por favor, me informe seu CPF para começarmos.";
pub const INVALID_TAX_ID: &str =
    "Não consegui identificar um CPF válido. Por favor, digite apenas os 11 números do seu CPF.";
pub const ASK_BIRTHDATE: &str = "Obrigado.\n\nQual é a sua data de nascimento?";
pub const INVALID_BIRTHDATE: &str =
    "Não consegui entender a data. Poderia informar novamente? (Ex: dia, mês e ano)";
pub const AUTH_FAILED: &str = "Não foi possível autenticar seus dados após 3 tentativas. \
    Por favor, entre em contato com o suporte.\n\nEncerrando o atendimento.";
pub const MENU_CLARIFICATION: &str = "Entendi. Posso te ajudar com serviços de crédito ou com cotações de câmbio. \
    Qual dessas opções você prefere?";
pub const LOST_TRACK: &str = "Desculpe, me perdi. Vamos começar de novo? Digite seu CPF.";

const GREETING_REPLY_INSTRUCTIONS: &str = "Você é um atendente bancário virtual do Banco Ágil. \
    Seu objetivo agora é APENAS pedir o CPF do cliente para iniciar o atendimento.\n\
    1. Se o cliente cumprimentou, responda ao cumprimento brevemente.\n\
    2. Se o cliente perguntou algo, diga que precisa identificá-lo primeiro.\n\
    3. Termine SEMPRE pedindo o CPF.\n\
    Não invente dados e seja direto e educado.";

/// CPF colado direto (só dígitos e pontuação) tem menos que isso em caracteres
const DIRECT_TAX_ID_MAX_CHARS: usize = 20;
const TAX_ID_DIGITS: usize = 11;

static BIRTHDATE_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn birthdate_re() -> Option<&'static Regex> {
    BIRTHDATE_RE
        .get_or_init(|| Regex::new(r"\b(19|20)\d{2}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])\b").ok())
        .as_ref()
}

pub fn welcome_message(name: &str) -> String {
    format!(
        "Olá {}, autenticação realizada com sucesso!\n\n\
         Como posso ajudar hoje? Posso verificar seu limite de crédito, solicitar um aumento ou, \
         se precisar, consultar a cotação de moedas estrangeiras.",
        name
    )
}

fn retry_message(attempts: u32) -> String {
    format!(
        "Dados incorretos. Tentativa {}/{}.\nPor favor, informe seu CPF novamente.",
        attempts, MAX_AUTH_ATTEMPTS
    )
}

/// 直接识别：去掉非数字后恰为 11 位，且原文很短
fn direct_tax_id(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == TAX_ID_DIGITS && text.trim().chars().count() < DIRECT_TAX_ID_MAX_CHARS)
        .then_some(digits)
}

fn direct_birthdate(text: &str) -> Option<String> {
    birthdate_re()
        .and_then(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}

pub struct TriageAgent {
    classifier: Arc<dyn Classifier>,
    customers: Arc<dyn CustomerStore>,
}

impl TriageAgent {
    pub fn new(classifier: Arc<dyn Classifier>, customers: Arc<dyn CustomerStore>) -> Self {
        Self {
            classifier,
            customers,
        }
    }

    fn reply(text: impl Into<String>) -> StatePatch {
        StatePatch::end_turn(Step::Triage).say(text)
    }

    async fn greet(&self, text: &str) -> StatePatch {
        let is_greeting = match classify::<GreetingIntent>(self.classifier.as_ref(), text).await {
            Ok(intent) => intent.is_greeting,
            Err(e) => {
                tracing::warn!("Greeting classification failed, treating as greeting: {}", e);
                true
            }
        };

        let reply = if is_greeting {
            ASK_TAX_ID.to_string()
        } else {
            match self.classifier.generate(GREETING_REPLY_INSTRUCTIONS, text).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("Greeting reply generation failed: {}", e);
                    ASK_TAX_ID.to_string()
                }
            }
        };
        Self::reply(reply).stage(TriageStage::CollectId)
    }

    async fn collect_tax_id(&self, text: &str) -> StatePatch {
        let candidate = match direct_tax_id(text) {
            Some(id) => Some(id),
            None => match classify::<TaxIdExtraction>(self.classifier.as_ref(), text).await {
                Ok(extracted) => extracted
                    .tax_id
                    .map(|id| id.chars().filter(|c| c.is_ascii_digit()).collect::<String>()),
                Err(e) => {
                    tracing::warn!("Tax id extraction failed: {}", e);
                    None
                }
            },
        };

        match candidate.filter(|id| id.len() == TAX_ID_DIGITS) {
            Some(id) => {
                tracing::info!("Tax id captured: {}", mask_tax_id(&id));
                Self::reply(ASK_BIRTHDATE)
                    .stage(TriageStage::CollectBirthdate)
                    .pending_id(id)
            }
            None => Self::reply(INVALID_TAX_ID),
        }
    }

    async fn extract_birthdate(&self, text: &str) -> Option<NaiveDate> {
        let raw = match direct_birthdate(text) {
            Some(date) => Some(date),
            None => match classify::<DateExtraction>(self.classifier.as_ref(), text).await {
                Ok(extracted) => extracted.date,
                Err(e) => {
                    tracing::warn!("Birth date extraction failed: {}", e);
                    None
                }
            },
        };
        raw.filter(|date| date.trim() != "INVALID")
            .and_then(|date| NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok())
    }

    async fn verify_birthdate(
        &self,
        state: &SessionState,
        text: &str,
    ) -> Result<StatePatch, HandlerFault> {
        let Some(pending_id) = state.pending_id.as_deref() else {
            tracing::warn!("Birth date stage without a pending tax id, restarting collection");
            return Ok(Self::reply(LOST_TRACK).stage(TriageStage::CollectId));
        };
        let Some(birth_date) = self.extract_birthdate(text).await else {
            return Ok(Self::reply(INVALID_BIRTHDATE));
        };

        if let Some(customer) = self
            .customers
            .lookup_by_id_and_birthdate(pending_id, birth_date)
            .await?
        {
            tracing::info!("Customer {} authenticated", mask_tax_id(&customer.tax_id));
            return Ok(Self::reply(welcome_message(&customer.name))
                .customer(customer)
                .auth_attempts(0)
                .stage(TriageStage::Authenticated)
                .clear_pending_id());
        }

        let attempts = (state.auth_attempts + 1).min(MAX_AUTH_ATTEMPTS);
        tracing::info!(
            attempts,
            "Authentication failed for {}",
            mask_tax_id(pending_id)
        );
        if attempts >= MAX_AUTH_ATTEMPTS {
            return Ok(Self::reply(AUTH_FAILED)
                .auth_attempts(attempts)
                .stage(TriageStage::Failed)
                .clear_pending_id());
        }
        Ok(Self::reply(retry_message(attempts))
            .auth_attempts(attempts)
            .stage(TriageStage::CollectId)
            .clear_pending_id())
    }

    async fn dispatch(&self, state: &SessionState, text: &str) -> StatePatch {
        if state.customer.is_none() {
            tracing::warn!("Authenticated stage without a customer, restarting collection");
            return Self::reply(LOST_TRACK).stage(TriageStage::CollectId);
        }

        let category = match classify::<TriageIntent>(self.classifier.as_ref(), text).await {
            Ok(intent) => intent.category,
            Err(e) => {
                tracing::warn!("Triage classification failed, asking again: {}", e);
                ServiceCategory::Other
            }
        };
        tracing::info!(?category, "Triage dispatch");

        match category {
            ServiceCategory::Credit => StatePatch::handoff(Step::CreditAgent),
            ServiceCategory::Exchange => StatePatch::handoff(Step::ExchangeAgent),
            ServiceCategory::Other => Self::reply(MENU_CLARIFICATION),
        }
    }
}

#[async_trait]
impl StepHandler for TriageAgent {
    fn step(&self) -> Step {
        Step::Triage
    }

    async fn handle(&self, state: &SessionState) -> Result<StatePatch, HandlerFault> {
        if state.triage_stage == TriageStage::Failed {
            return Ok(Self::reply(AUTH_FAILED));
        }

        let text = state.last_user_text();
        if is_exit(self.classifier.as_ref(), text).await {
            return Ok(closing_patch());
        }

        match state.triage_stage {
            TriageStage::Greeting => Ok(self.greet(text).await),
            TriageStage::CollectId => Ok(self.collect_tax_id(text).await),
            TriageStage::CollectBirthdate => self.verify_birthdate(state, text).await,
            TriageStage::Authenticated => Ok(self.dispatch(state, text).await),
            TriageStage::Failed => Ok(Self::reply(AUTH_FAILED)),
        }
    }
}
