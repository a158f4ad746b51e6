//! 编排器：单轮对话的主控循环
//!
//! 追加用户消息后从入口步骤开始：调用处理器、校验其声明的下一跳是否在该步骤的固定出边内、
//! 合并补丁，直到下一跳为 end。处理器故障在此转换为兜底补丁；越界路由与步数超限作为 OrchestratorError 返回。

use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::interview::QUESTIONS;
use crate::agents::StepHandler;
use crate::core::error::OrchestratorError;
use crate::core::message::Role;
use crate::core::recovery::RecoveryEngine;
use crate::core::state::{Route, SessionState, Step};

const TRIAGE_ROUTES: &[Route] = &[
    Route::Step(Step::Triage),
    Route::Step(Step::CreditAgent),
    Route::Step(Step::ExchangeAgent),
    Route::Step(Step::InterviewAgent),
    Route::Step(Step::InterviewOffer),
    Route::End,
];
const CREDIT_ROUTES: &[Route] = &[
    Route::Step(Step::Triage),
    Route::Step(Step::CreditAgent),
    Route::Step(Step::InterviewOffer),
    Route::End,
];
const OFFER_ROUTES: &[Route] = &[
    Route::Step(Step::InterviewAgent),
    Route::Step(Step::Triage),
    Route::End,
];
const INTERVIEW_ROUTES: &[Route] = &[
    Route::Step(Step::InterviewAgent),
    Route::Step(Step::CreditAgent),
    Route::End,
];
const EXCHANGE_ROUTES: &[Route] = &[Route::Step(Step::Triage), Route::End];

/// 每个步骤允许的下一跳（固定拓扑）
pub fn allowed_routes(step: Step) -> &'static [Route] {
    match step {
        Step::Triage => TRIAGE_ROUTES,
        Step::CreditAgent => CREDIT_ROUTES,
        Step::InterviewOffer => OFFER_ROUTES,
        Step::InterviewAgent => INTERVIEW_ROUTES,
        Step::ExchangeAgent => EXCHANGE_ROUTES,
    }
}

/// 单轮结果：合并后的状态与本轮产生的助手消息
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub state: SessionState,
    pub replies: Vec<String>,
}

impl TurnOutput {
    /// 本轮全部助手消息，以空行连接
    pub fn reply(&self) -> String {
        self.replies.join("\n\n")
    }
}

pub struct Orchestrator {
    handlers: HashMap<Step, Arc<dyn StepHandler>>,
    recovery: RecoveryEngine,
    max_steps: usize,
}

impl Orchestrator {
    pub fn new(
        handlers: Vec<Arc<dyn StepHandler>>,
        recovery: RecoveryEngine,
        max_steps: usize,
    ) -> Self {
        let handlers = handlers.into_iter().map(|h| (h.step(), h)).collect();
        Self {
            handlers,
            recovery,
            max_steps: max_steps.max(1),
        }
    }

    /// 已认证时由 active_step 接管，否则从 triage 开始
    pub fn entry_step(state: &SessionState) -> Step {
        if state.customer.is_some() {
            state.active_step
        } else {
            Step::Triage
        }
    }

    pub async fn run_turn(
        &self,
        mut state: SessionState,
        user_text: &str,
    ) -> Result<TurnOutput, OrchestratorError> {
        state.push_user(user_text);
        let first_new = state.messages.len();
        let mut current = Self::entry_step(&state);
        let mut steps = 0;

        loop {
            if steps >= self.max_steps {
                tracing::error!(limit = self.max_steps, "Turn exceeded the step limit");
                return Err(OrchestratorError::StepLimitExceeded {
                    limit: self.max_steps,
                });
            }
            steps += 1;

            let handler = self
                .handlers
                .get(&current)
                .ok_or(OrchestratorError::MissingHandler(current))?;
            tracing::debug!(step = %current, "Dispatching step");

            let patch = match handler.handle(&state).await {
                Ok(patch) => patch,
                Err(fault) => self.recovery.fallback_patch(current, &fault).await,
            };
            if !allowed_routes(current).contains(&patch.next_step) {
                tracing::error!(from = %current, to = %patch.next_step, "Route outside allowed edges");
                return Err(OrchestratorError::InvalidRoute {
                    from: current,
                    to: patch.next_step,
                });
            }

            state.apply(patch);
            match state.next_step {
                Route::End => break,
                Route::Step(next) => current = next,
            }
        }

        let violations = state.invariant_violations(QUESTIONS.len());
        if !violations.is_empty() {
            tracing::warn!(?violations, "Session state invariants violated after turn");
        }
        tracing::info!(steps, active = %state.active_step, stage = ?state.triage_stage, "Turn finished");

        let replies = state.messages[first_new..]
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone())
            .collect();
        Ok(TurnOutput { state, replies })
    }
}
