//! 会话运行时（对话入口）
//!
//! 接收 {session_id, message}，返回 {response}。同一 session 的请求经由各自的互斥锁串行执行；
//! 不同 session 可并发。编排错误不会到达传输层：记录日志、不保存本轮状态、回复固定致歉。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::session_store::SessionStore;
use crate::core::recovery::FALLBACK_APOLOGY;
use crate::core::Orchestrator;

/// 对话请求（HTTP 与控制台共用）
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

fn default_session_id() -> String {
    "default".to_string()
}

/// 对话回复：本轮全部助手消息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub response: String,
}

pub struct ChatRuntime {
    orchestrator: Orchestrator,
    sessions: Arc<dyn SessionStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChatRuntime {
    pub fn new(orchestrator: Orchestrator, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            orchestrator,
            sessions,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// 未过期会话数（健康检查用）
    pub async fn active_sessions(&self) -> usize {
        self.sessions.active_count().await
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 处理一条用户消息
    pub async fn handle_message(&self, session_id: &str, text: &str) -> ChatReply {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let state = self.sessions.get_or_create(session_id).await;
        match self.orchestrator.run_turn(state, text).await {
            Ok(turn) => {
                let response = turn.reply();
                self.sessions.save(session_id, turn.state).await;
                ChatReply { response }
            }
            Err(e) => {
                tracing::error!(session = session_id, "Turn aborted: {}", e);
                ChatReply {
                    response: FALLBACK_APOLOGY.to_string(),
                }
            }
        }
    }

    pub async fn handle(&self, request: &ChatRequest) -> ChatReply {
        self.handle_message(&request.session_id, &request.message).await
    }

    /// 清理过期会话与无人持有的会话锁
    pub async fn cleanup_expired(&self) -> usize {
        let removed = self.sessions.cleanup_expired().await;
        self.locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        if removed > 0 {
            tracing::info!("Evicted {} idle sessions", removed);
        }
        removed
    }
}
