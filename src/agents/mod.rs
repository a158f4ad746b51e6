//! 步骤处理器：Triage / Credit / InterviewOffer / Interview / Exchange
//!
//! 每个处理器只读取会话状态并返回 StatePatch（或 HandlerFault），不直接修改状态；
//! 路由、合并与兜底由编排器负责。所有处理器共享同一套退出意图约定（见 [`closing_patch`]）。

pub mod credit;
pub mod exchange;
pub mod interview;
pub mod offer;
pub mod triage;

use std::sync::Arc;

use async_trait::async_trait;

use crate::bank::{Customer, CustomerStore, LimitService};
use crate::classifier::schemas::ExitIntent;
use crate::classifier::{classify, Classifier};
use crate::core::error::HandlerFault;
use crate::core::state::{SessionState, StatePatch, Step};
use crate::tools::ExchangeRateSource;

pub use credit::CreditAgent;
pub use exchange::ExchangeAgent;
pub use interview::InterviewAgent;
pub use offer::InterviewOfferAgent;
pub use triage::TriageAgent;

/// 退出意图命中时的结束语
pub const CLOSING_MESSAGE: &str = "Atendimento finalizado com sucesso. Foi um prazer te ajudar! \
    Se precisar de mais alguma coisa, é só mandar uma nova mensagem que eu volto a te atender. Até logo!";

/// 单个步骤处理器
#[async_trait]
pub trait StepHandler: Send + Sync {
    fn step(&self) -> Step;

    async fn handle(&self, state: &SessionState) -> Result<StatePatch, HandlerFault>;
}

/// 处理器依赖的外部协作者
#[derive(Clone)]
pub struct Services {
    pub classifier: Arc<dyn Classifier>,
    pub customers: Arc<dyn CustomerStore>,
    pub limits: LimitService,
    pub rates: Arc<dyn ExchangeRateSource>,
}

/// 组装全部五个处理器
pub fn standard_handlers(services: &Services) -> Vec<Arc<dyn StepHandler>> {
    vec![
        Arc::new(TriageAgent::new(services.classifier.clone(), services.customers.clone())),
        Arc::new(CreditAgent::new(services.classifier.clone(), services.limits.clone())),
        Arc::new(InterviewOfferAgent::new(services.classifier.clone())),
        Arc::new(InterviewAgent::new(services.classifier.clone(), services.customers.clone())),
        Arc::new(ExchangeAgent::new(services.classifier.clone(), services.rates.clone())),
    ]
}

/// 退出意图判定；分类失败视为不退出
pub async fn is_exit(classifier: &dyn Classifier, text: &str) -> bool {
    match classify::<ExitIntent>(classifier, text).await {
        Ok(intent) => intent.is_exit,
        Err(e) => {
            tracing::warn!("Exit intent check failed, continuing: {}", e);
            false
        }
    }
}

/// 结束语 + 回到未认证的问候阶段，下一轮由 triage 接管
pub fn closing_patch() -> StatePatch {
    StatePatch::end_turn(Step::Triage)
        .say(CLOSING_MESSAGE)
        .reset_session()
}

/// 取已认证客户；缺失说明路由出错
pub(crate) fn authenticated(state: &SessionState, step: Step) -> Result<&Customer, HandlerFault> {
    state
        .customer
        .as_ref()
        .ok_or(HandlerFault::NotAuthenticated(step))
}

/// 金额显示为 `R$ 1234.56`
pub(crate) fn brl(amount: f64) -> String {
    format!("R$ {:.2}", amount)
}

#[cfg(test)]
pub(crate) mod testing {
    //! 处理器单测共用的夹具

    use chrono::NaiveDate;

    use crate::bank::Customer;
    use crate::core::state::{SessionState, Step, TriageStage};

    pub fn ana() -> Customer {
        Customer {
            tax_id: "12345678901".to_string(),
            name: "Ana Souza".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 10).unwrap(),
            current_limit: 2500.0,
            score: 620,
        }
    }

    /// 已认证、由 step 接管、最后一条用户消息为 text 的状态
    pub fn authenticated_state(step: Step, text: &str) -> SessionState {
        let mut state = SessionState::new();
        state.customer = Some(ana());
        state.triage_stage = TriageStage::Authenticated;
        state.active_step = step;
        state.push_user(text);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::StubClassifier;
    use crate::core::state::{Route, TriageStage};
    use serde_json::json;

    #[tokio::test]
    async fn test_exit_check_fails_closed_to_continue() {
        let stub = StubClassifier::new().failing::<ExitIntent>();
        assert!(!is_exit(&stub, "tchau").await);

        let stub = StubClassifier::new().on::<ExitIntent>(|_| json!({"is_exit": true}));
        assert!(is_exit(&stub, "tchau").await);
    }

    #[test]
    fn test_closing_patch_resets_to_greeting() {
        let mut state = testing::authenticated_state(Step::CreditAgent, "tchau");
        state.interview_progress = 2;
        state.interview_answers = vec!["5000".to_string()];

        state.apply(closing_patch());
        assert_eq!(state.next_step, Route::End);
        assert_eq!(state.active_step, Step::Triage);
        assert_eq!(state.triage_stage, TriageStage::Greeting);
        assert_eq!(state.customer, None);
        assert_eq!(state.interview_progress, 0);
        assert!(state.invariant_violations(5).is_empty());
    }

    #[test]
    fn test_brl_format() {
        assert_eq!(brl(2500.0), "R$ 2500.00");
        assert_eq!(brl(1234.567), "R$ 1234.57");
    }
}
