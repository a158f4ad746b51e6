//! 会话存储抽象层
//!
//! 按 session id 存取 SessionState；内存实现带空闲过期（TTL），由后台任务定期清理。
//! 进程重启后会话丢失。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::core::SessionState;

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Option<SessionState>;

    /// 首次出现的 session id 得到默认状态（greeting / 0 次尝试 / triage）
    async fn get_or_create(&self, session_id: &str) -> SessionState;

    async fn save(&self, session_id: &str, state: SessionState);

    /// 清理过期会话，返回清理数量
    async fn cleanup_expired(&self) -> usize;

    /// 获取未过期的会话数
    async fn active_count(&self) -> usize;
}

struct StoredSession {
    state: SessionState,
    last_active: Instant,
}

impl StoredSession {
    fn is_expired(&self, timeout: Duration) -> bool {
        self.last_active.elapsed() > timeout
    }
}

/// 内存会话存储
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    idle_timeout: Duration,
}

impl MemorySessionStore {
    pub fn new(idle_timeout_secs: u64) -> Self {
        Self::with_timeout(Duration::from_secs(idle_timeout_secs))
    }

    pub fn with_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Option<SessionState> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .filter(|s| !s.is_expired(self.idle_timeout))
            .map(|s| s.state.clone())
    }

    async fn get_or_create(&self, session_id: &str) -> SessionState {
        let mut sessions = self.sessions.write().await;
        let expired = sessions
            .get(session_id)
            .map(|s| s.is_expired(self.idle_timeout))
            .unwrap_or(false);
        if expired {
            tracing::info!("Session {} expired, starting over", session_id);
            sessions.remove(session_id);
        }

        let stored = sessions.entry(session_id.to_string()).or_insert_with(|| {
            tracing::info!("New session {}", session_id);
            StoredSession {
                state: SessionState::new(),
                last_active: Instant::now(),
            }
        });
        stored.last_active = Instant::now();
        stored.state.clone()
    }

    async fn save(&self, session_id: &str, state: SessionState) {
        self.sessions.write().await.insert(
            session_id.to_string(),
            StoredSession {
                state,
                last_active: Instant::now(),
            },
        );
    }

    async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.idle_timeout));
        before - sessions.len()
    }

    async fn active_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| !s.is_expired(self.idle_timeout))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TriageStage;

    #[tokio::test]
    async fn test_new_session_has_defaults() {
        let store = MemorySessionStore::new(60);
        let state = store.get_or_create("s1").await;
        assert_eq!(state, SessionState::new());
        assert_eq!(store.active_count().await, 1);
        assert!(store.get("other").await.is_none());
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let store = MemorySessionStore::new(60);
        let mut state = store.get_or_create("s1").await;
        state.triage_stage = TriageStage::CollectId;
        store.save("s1", state.clone()).await;

        assert_eq!(store.get("s1").await, Some(state));
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let store = MemorySessionStore::with_timeout(Duration::from_millis(20));
        let mut state = store.get_or_create("s1").await;
        state.triage_stage = TriageStage::CollectId;
        store.save("s1", state).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get("s1").await.is_none());
        assert_eq!(store.active_count().await, 0);
        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.active_count().await, 0);
        assert_eq!(store.get_or_create("s1").await, SessionState::new());
    }
}
