//! 核心编排层：会话状态模型、状态补丁、错误类型、兜底恢复、主控循环

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use error::{HandlerFault, OrchestratorError};
pub use message::{Message, Role};
pub use orchestrator::{allowed_routes, Orchestrator, TurnOutput};
pub use recovery::RecoveryEngine;
pub use state::{Route, SessionState, StatePatch, Step, TriageStage, MAX_AUTH_ATTEMPTS};
