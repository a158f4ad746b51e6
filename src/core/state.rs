//! 会话状态：每个对话一份的显式状态记录，以及处理器返回的部分更新（StatePatch）
//!
//! 编排器独占本轮的 SessionState；处理器只读取它并返回 StatePatch，由编排器逐字段合并：
//! 消息追加，其余字段有值即覆盖。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bank::Customer;
use crate::core::message::Message;

/// 认证失败达到该次数后会话进入 failed
pub const MAX_AUTH_ATTEMPTS: u32 = 3;

/// 步骤名（对话逻辑单元）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Triage,
    CreditAgent,
    InterviewOffer,
    InterviewAgent,
    ExchangeAgent,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Triage => "triage",
            Step::CreditAgent => "credit_agent",
            Step::InterviewOffer => "interview_offer",
            Step::InterviewAgent => "interview_agent",
            Step::ExchangeAgent => "exchange_agent",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 本轮内的下一跳：另一个步骤或结束标记
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Step(Step),
    End,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Step(step) => step.fmt(f),
            Route::End => f.write_str("end"),
        }
    }
}

/// Triage 内部状态机阶段
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageStage {
    #[default]
    Greeting,
    CollectId,
    CollectBirthdate,
    Authenticated,
    Failed,
}

/// 单个会话的完整状态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// 全部消息，只追加
    pub messages: Vec<Message>,
    /// 已认证客户；当且仅当 triage_stage = Authenticated 时存在
    pub customer: Option<Customer>,
    pub auth_attempts: u32,
    /// 本轮内的路由，仅在一轮之内有意义
    pub next_step: Route,
    /// 下一轮由哪个步骤接管
    pub active_step: Step,
    /// 已提出的访谈问题数（0 = 未开始）；等待第 k 题回答时为 k
    pub interview_progress: usize,
    pub interview_answers: Vec<String>,
    pub triage_stage: TriageStage,
    /// 已采集、尚未与生日一起验证的 CPF
    pub pending_id: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            customer: None,
            auth_attempts: 0,
            next_step: Route::Step(Step::Triage),
            active_step: Step::Triage,
            interview_progress: 0,
            interview_answers: Vec::new(),
            triage_stage: TriageStage::Greeting,
            pending_id: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最近一条用户消息文本；尚无用户消息时为空串
    pub fn last_user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// 合并处理器输出：消息追加，其余字段有值即覆盖
    pub fn apply(&mut self, patch: StatePatch) {
        self.messages.extend(patch.messages);
        self.next_step = patch.next_step;
        self.active_step = patch.active_step;
        if let Some(customer) = patch.customer {
            self.customer = customer;
        }
        if let Some(attempts) = patch.auth_attempts {
            self.auth_attempts = attempts;
        }
        if let Some(progress) = patch.interview_progress {
            self.interview_progress = progress;
        }
        if let Some(answers) = patch.interview_answers {
            self.interview_answers = answers;
        }
        if let Some(stage) = patch.triage_stage {
            self.triage_stage = stage;
        }
        if let Some(pending_id) = patch.pending_id {
            self.pending_id = pending_id;
        }
    }

    /// 检查跨字段不变式，返回违反项（测试与调试日志用）
    pub fn invariant_violations(&self, question_count: usize) -> Vec<&'static str> {
        let mut violations = Vec::new();
        if self.triage_stage != TriageStage::Failed && self.auth_attempts >= MAX_AUTH_ATTEMPTS {
            violations.push("auth_attempts reached the limit outside the failed stage");
        }
        if self.customer.is_some() != (self.triage_stage == TriageStage::Authenticated) {
            violations.push("customer presence disagrees with the triage stage");
        }
        if self.interview_progress > question_count {
            violations.push("interview_progress beyond the question list");
        }
        if self.interview_answers.len() != self.interview_progress.saturating_sub(1) {
            violations.push("interview_answers out of step with interview_progress");
        }
        violations
    }
}

/// 处理器输出的部分状态更新
///
/// next_step / active_step 每次都必须给出；可空字段用 `Option<Option<T>>` 区分「不改」与「清空」。
#[derive(Clone, Debug, PartialEq)]
pub struct StatePatch {
    pub messages: Vec<Message>,
    pub next_step: Route,
    pub active_step: Step,
    pub customer: Option<Option<Customer>>,
    pub auth_attempts: Option<u32>,
    pub interview_progress: Option<usize>,
    pub interview_answers: Option<Vec<String>>,
    pub triage_stage: Option<TriageStage>,
    pub pending_id: Option<Option<String>>,
}

impl StatePatch {
    pub fn new(next_step: Route, active_step: Step) -> Self {
        Self {
            messages: Vec::new(),
            next_step,
            active_step,
            customer: None,
            auth_attempts: None,
            interview_progress: None,
            interview_answers: None,
            triage_stage: None,
            pending_id: None,
        }
    }

    /// 结束本轮，下一轮由 active_step 接管
    pub fn end_turn(active_step: Step) -> Self {
        Self::new(Route::End, active_step)
    }

    /// 本轮内立即交给 step，下一轮也由它接管
    pub fn handoff(step: Step) -> Self {
        Self::new(Route::Step(step), step)
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.messages.push(Message::assistant(text));
        self
    }

    pub fn stage(mut self, stage: TriageStage) -> Self {
        self.triage_stage = Some(stage);
        self
    }

    pub fn customer(mut self, customer: Customer) -> Self {
        self.customer = Some(Some(customer));
        self
    }

    pub fn clear_customer(mut self) -> Self {
        self.customer = Some(None);
        self
    }

    pub fn auth_attempts(mut self, attempts: u32) -> Self {
        self.auth_attempts = Some(attempts);
        self
    }

    pub fn pending_id(mut self, tax_id: impl Into<String>) -> Self {
        self.pending_id = Some(Some(tax_id.into()));
        self
    }

    pub fn clear_pending_id(mut self) -> Self {
        self.pending_id = Some(None);
        self
    }

    pub fn interview(mut self, progress: usize, answers: Vec<String>) -> Self {
        self.interview_progress = Some(progress);
        self.interview_answers = Some(answers);
        self
    }

    /// 回到未认证的问候阶段：清空客户、待验证 CPF 与访谈进度
    pub fn reset_session(self) -> Self {
        self.stage(TriageStage::Greeting)
            .clear_customer()
            .clear_pending_id()
            .interview(0, Vec::new())
    }
}
