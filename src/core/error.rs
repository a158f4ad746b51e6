//! 处理器故障与编排错误
//!
//! HandlerFault 在处理器边界被编排器转换为统一兜底回复（见 RecoveryEngine）；
//! OrchestratorError 表示编程错误（越界路由、步数超限），不面向用户恢复。

use thiserror::Error;

use crate::bank::{LimitError, StoreError};
use crate::classifier::ClassifyError;
use crate::core::state::{Route, Step};

/// 处理器内部的意外错误（存储 I/O、网络、超出已处理范围的分类结果等）
#[derive(Error, Debug)]
pub enum HandlerFault {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("classifier failure: {0}")]
    Classifier(#[from] ClassifyError),

    #[error("limit procedure failure: {0}")]
    Limit(#[from] LimitError),

    #[error("missing authenticated customer in {0}")]
    NotAuthenticated(Step),

    #[error("internal error: {0}")]
    Internal(String),
}

/// 编排层错误：不应在正确实现中出现
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("step {from} declared route {to} outside its allowed edges")]
    InvalidRoute { from: Step, to: Route },

    #[error("turn exceeded {limit} steps")]
    StepLimitExceeded { limit: usize },

    #[error("no handler registered for step {0}")]
    MissingHandler(Step),
}
