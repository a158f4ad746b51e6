//! Exchange：外币汇率查询

use std::sync::Arc;

use async_trait::async_trait;

use super::{brl, closing_patch, is_exit, StepHandler};
use crate::classifier::schemas::{CurrencyChoice, CurrencyExtraction};
use crate::classifier::{classify, Classifier};
use crate::core::error::HandlerFault;
use crate::core::state::{SessionState, StatePatch, Step};
use crate::tools::{CurrencyCode, ExchangeRateSource};

pub const UNSUPPORTED_CURRENCY: &str = "No momento consigo consultar apenas dólar (USD), euro (EUR) e libra (GBP). \
    Qual dessas moedas você gostaria de ver?";

fn rate_message(code: CurrencyCode, rate: f64) -> String {
    format!(
        "A cotação atual do {} é {}.\n\n\
         Deseja consultar outra moeda? Se preferir, também posso te ajudar com serviços de crédito \
         ou finalizar nosso atendimento.",
        code,
        brl(rate)
    )
}

fn rate_unavailable_message(code: CurrencyCode) -> String {
    format!(
        "Não consegui obter a cotação do {} agora. Por favor, tente novamente em instantes.\n\n\
         Enquanto isso, posso te ajudar com serviços de crédito ou finalizar nosso atendimento.",
        code
    )
}

pub struct ExchangeAgent {
    classifier: Arc<dyn Classifier>,
    rates: Arc<dyn ExchangeRateSource>,
}

impl ExchangeAgent {
    pub fn new(classifier: Arc<dyn Classifier>, rates: Arc<dyn ExchangeRateSource>) -> Self {
        Self { classifier, rates }
    }

    /// 分类失败按 USD 处理；其它币种返回 None
    async fn currency(&self, text: &str) -> Option<CurrencyCode> {
        let choice = match classify::<CurrencyExtraction>(self.classifier.as_ref(), text).await {
            Ok(extracted) => extracted.currency_code,
            Err(e) => {
                tracing::warn!("Currency extraction failed, defaulting to USD: {}", e);
                CurrencyChoice::Usd
            }
        };
        match choice {
            CurrencyChoice::Usd => Some(CurrencyCode::Usd),
            CurrencyChoice::Eur => Some(CurrencyCode::Eur),
            CurrencyChoice::Gbp => Some(CurrencyCode::Gbp),
            CurrencyChoice::Other => None,
        }
    }
}

#[async_trait]
impl StepHandler for ExchangeAgent {
    fn step(&self) -> Step {
        Step::ExchangeAgent
    }

    async fn handle(&self, state: &SessionState) -> Result<StatePatch, HandlerFault> {
        let text = state.last_user_text();
        if is_exit(self.classifier.as_ref(), text).await {
            return Ok(closing_patch());
        }

        let Some(code) = self.currency(text).await else {
            return Ok(StatePatch::end_turn(Step::Triage).say(UNSUPPORTED_CURRENCY));
        };

        let reply = match self.rates.rate_for(code).await {
            Ok(rate) => {
                tracing::info!(%code, rate, "Exchange rate served");
                rate_message(code, rate)
            }
            Err(e) => {
                tracing::warn!(%code, "Exchange rate lookup failed: {}", e);
                rate_unavailable_message(code)
            }
        };
        Ok(StatePatch::end_turn(Step::Triage).say(reply))
    }
}
