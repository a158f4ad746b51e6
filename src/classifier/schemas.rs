//! 各调用点的结构化输出 schema 与任务指令

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Schema;

/// 宽松的数值解析：模型常把数字写成字符串（"3000"、"R$ 3.000,00"）或把整数写成 1.0
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn parse_amount(text: &str) -> Option<f64> {
        let text = text.trim().trim_start_matches("R$").trim();
        let thousands_only = text.contains('.')
            && !text.contains(',')
            && text
                .split('.')
                .skip(1)
                .all(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit()));
        if thousands_only {
            return text.replace('.', "").parse::<f64>().ok().filter(|v| v.is_finite());
        }
        let parsed = text.parse::<f64>().ok().or_else(|| {
            // 巴西写法：千位用点，小数用逗号
            text.replace('.', "").replace(',', ".").parse::<f64>().ok()
        });
        parsed.filter(|v| v.is_finite())
    }

    fn number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_amount(s),
            _ => None,
        }
    }

    pub fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        number(&value).ok_or_else(|| D::Error::custom(format!("expected a number, got {}", value)))
    }

    /// 无法解析的值视为缺失
    pub fn opt_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(number))
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value.as_i64() {
            Some(n) => Ok(n),
            None => number(&value)
                .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                .map(|v| v as i64)
                .ok_or_else(|| D::Error::custom(format!("expected an integer, got {}", value))),
        }
    }
}

/// 用户是否想结束对话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExitIntent {
    /// 用户想结束、sair、parar ou finalizar o atendimento
    pub is_exit: bool,
}

impl Schema for ExitIntent {
    const NAME: &'static str = "exit_intent";

    fn instructions() -> &'static str {
        "Você classifica a intenção de encerramento de uma conversa bancária.\n\
         Marque is_exit=true quando o cliente quer terminar, sair ou parar \
         (ex.: 'tchau', 'pode encerrar', 'não quero mais nada', 'já resolvi').\n\
         Respostas a perguntas, dúvidas e pedidos de continuação são is_exit=false."
    }
}

/// Mensagem é só uma saudação?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GreetingIntent {
    /// true se a mensagem for apenas um cumprimento, sem pedido concreto
    pub is_greeting: bool,
}

impl Schema for GreetingIntent {
    const NAME: &'static str = "greeting_intent";

    fn instructions() -> &'static str {
        "Decida se a mensagem do cliente é apenas um cumprimento inicial \
         ('Oi', 'Olá', 'Bom dia') ou se já traz uma solicitação ou informação.\n\
         Somente cumprimento: is_greeting=true. Qualquer conteúdo além disso: is_greeting=false."
    }
}

/// CPF extraído do texto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaxIdExtraction {
    /// CPF apenas com dígitos (11), ou null se não houver
    #[serde(rename = "cpf", default)]
    pub tax_id: Option<String>,
}

impl Schema for TaxIdExtraction {
    const NAME: &'static str = "tax_id_extraction";

    fn instructions() -> &'static str {
        "Extraia o CPF da mensagem do cliente e devolva somente os dígitos.\n\
         Se não houver um CPF com 11 dígitos, devolva null."
    }
}

/// Data de nascimento normalizada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DateExtraction {
    /// Data no formato exato YYYY-MM-DD, ou "INVALID"
    #[serde(default)]
    pub date: Option<String>,
}

impl Schema for DateExtraction {
    const NAME: &'static str = "date_extraction";

    fn instructions() -> &'static str {
        "Extraia a data de nascimento da mensagem e escreva-a exatamente como YYYY-MM-DD.\n\
         Exemplos: '20/10/2000' -> '2000-10-20'; '20 de outubro de 2000' -> '2000-10-20'; \
         '10-05-90' -> '1990-05-10'.\n\
         Se não houver data válida, devolva 'INVALID'."
    }
}

/// Serviço pedido por um cliente autenticado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceCategory {
    Credit,
    Exchange,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TriageIntent {
    pub category: ServiceCategory,
}

impl Schema for TriageIntent {
    const NAME: &'static str = "triage_intent";

    fn instructions() -> &'static str {
        "Classifique o pedido de um cliente bancário já autenticado.\n\
         CREDIT: limite de crédito ou aumento de limite.\n\
         EXCHANGE: cotação de moedas estrangeiras.\n\
         OTHER: cumprimentos, ajuda geral ou qualquer outro assunto."
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditAction {
    CheckLimit,
    RequestIncrease,
    Other,
}

/// Intenção dentro do atendimento de crédito
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreditIntent {
    pub intent: CreditAction,
    /// Valor monetário pedido, se houver (ex.: 3000.00)
    #[serde(default, deserialize_with = "lenient::opt_amount")]
    pub value: Option<f64>,
}

impl Schema for CreditIntent {
    const NAME: &'static str = "credit_intent";

    fn instructions() -> &'static str {
        "Classifique a mensagem de um cliente no atendimento de crédito.\n\
         CHECK_LIMIT: quer saber o limite atual ('qual meu limite?').\n\
         REQUEST_INCREASE: pede aumento ou informa apenas um valor ('3000', 'quero 5 mil'); \
         preencha value com o número quando houver.\n\
         OTHER: qualquer outra coisa."
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferDecision {
    Accept,
    Decline,
    Unclear,
}

/// Resposta à oferta de entrevista
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OfferResponse {
    pub decision: OfferDecision,
}

impl Schema for OfferResponse {
    const NAME: &'static str = "interview_offer";

    fn instructions() -> &'static str {
        "O cliente recebeu a proposta de uma entrevista para melhorar o score.\n\
         ACCEPT: concordou ('sim', 'bora', 'pode ser').\n\
         DECLINE: recusou ('não', 'agora não', 'deixa pra lá').\n\
         UNCLEAR: não dá para saber."
    }
}

/// Validação de uma resposta da entrevista
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerValidation {
    /// A resposta faz sentido para a pergunta
    pub valid: bool,
    /// Pedido curto e educado de correção quando inválida
    #[serde(default)]
    pub feedback: Option<String>,
    /// Valor limpo extraído da resposta (ex.: '5000' para 'ganho 5k')
    #[serde(default)]
    pub cleaned_value: Option<String>,
}

impl Schema for AnswerValidation {
    const NAME: &'static str = "answer_validation";

    fn instructions() -> &'static str {
        "Você valida respostas de uma entrevista de crédito. A entrada traz PERGUNTA e RESPOSTA.\n\
         Se a resposta fizer sentido para a pergunta, valid=true e cleaned_value com o valor limpo.\n\
         Se não fizer sentido (risadas, texto aleatório, fuga do assunto), valid=false e \
         feedback com um pedido breve de correção."
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurrencyChoice {
    Usd,
    Eur,
    Gbp,
    Other,
}

/// Moeda que o cliente quer consultar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CurrencyExtraction {
    pub currency_code: CurrencyChoice,
}

impl Schema for CurrencyExtraction {
    const NAME: &'static str = "currency_extraction";

    fn instructions() -> &'static str {
        "Identifique a moeda que o cliente quer cotar: USD (dólar), EUR (euro) ou GBP (libra).\n\
         Se não estiver claro, use USD. Para outras moedas, use OTHER."
    }
}

/// Vínculo de trabalho normalizado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Formal,
    #[serde(alias = "autônomo", alias = "autonomo")]
    Autonomous,
    #[serde(alias = "desempregado")]
    Unemployed,
    #[serde(other)]
    #[schemars(skip)]
    Unrecognized,
}

/// Perfil financeiro normalizado a partir das cinco respostas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InterviewProfile {
    /// Renda mensal
    #[serde(deserialize_with = "lenient::amount")]
    pub income: f64,
    pub job_type: JobType,
    /// Despesas fixas mensais
    #[serde(deserialize_with = "lenient::amount")]
    pub expenses: f64,
    /// Número total de dependentes
    #[serde(deserialize_with = "lenient::count")]
    pub dependents: i64,
    pub has_debts: bool,
}

impl Schema for InterviewProfile {
    const NAME: &'static str = "interview_profile";

    fn instructions() -> &'static str {
        "Você é analista de crédito. A entrada traz as perguntas (P) e respostas (R) de uma entrevista.\n\
         Converta valores monetários em número ('5k' -> 5000).\n\
         job_type: 'formal' (CLT, servidor público), 'autonomous' (PJ, freelancer, empresário) \
         ou 'unemployed'.\n\
         dependents: total de dependentes. has_debts: se há dívidas ativas."
    }
}
