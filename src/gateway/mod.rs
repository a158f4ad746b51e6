//! 对话网关：会话存储与对话入口
//!
//! ```text
//! 控制台 / HTTP  ->  ChatRuntime (按 session 串行)  ->  Orchestrator  ->  步骤处理器
//!                        |
//!                   SessionStore (TTL)
//! ```

pub mod runtime;
pub mod session_store;

pub use runtime::{ChatReply, ChatRequest, ChatRuntime};
pub use session_store::{MemorySessionStore, SessionStore};
