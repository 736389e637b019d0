//! 会话历史：按 chat 维护 Claude session id 的追加式记录
//!
//! session id 由 CLI 返回（本地从不生成），每轮可能轮换，因此续接后也总是追加新 id。
//! 列表只追加、不改写、不删除，顺序即新旧；前缀查找从最新往旧扫，命中即停。
//! 进程内存态，重启即清空，不做持久化。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

/// 会话注册表
///
/// 跨 chat 的并发读写安全；同一 chat 内的调用需持有 [`conversation_lock`]
/// 串行化（追加顺序决定「最新」语义，不能乱序）。
///
/// [`conversation_lock`]: SessionRegistry::conversation_lock
#[derive(Default)]
pub struct SessionRegistry {
    /// chat_key -> 按追加顺序的 session id 列表
    sessions: RwLock<HashMap<String, Vec<String>>>,
    /// chat_key -> 调用串行锁（不同 chat 互不阻塞）
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条 session id；chat 不存在时自动建列表
    pub async fn append(&self, chat_key: &str, session_id: String) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(chat_key.to_string())
            .or_default()
            .push(session_id);
    }

    /// 该 chat 最近一次追加的 session id
    pub async fn latest(&self, chat_key: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        sessions.get(chat_key).and_then(|list| list.last().cloned())
    }

    /// 按前缀查找（大小写不敏感），从最新往旧扫，返回第一个命中
    ///
    /// 短前缀有歧义时解析为最新的那条；chat 未知或无命中返回 None。
    pub async fn lookup_by_prefix(&self, chat_key: &str, prefix: &str) -> Option<String> {
        let prefix = prefix.to_ascii_lowercase();
        let sessions = self.sessions.read().await;
        sessions.get(chat_key).and_then(|list| {
            list.iter()
                .rev()
                .find(|id| id.to_ascii_lowercase().starts_with(&prefix))
                .cloned()
        })
    }

    /// 取该 chat 的串行锁（不存在则创建）
    ///
    /// 调用方在整个「解析续接目标 → 执行 → 追加」期间持有，
    /// 保证同一 chat 的追加顺序；锁粒度为 chat，不同 chat 并行。
    pub async fn conversation_lock(&self, chat_key: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(chat_key) {
                return lock.clone();
            }
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(chat_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_then_latest() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.latest("chat1").await, None);

        registry.append("chat1", "abc111".to_string()).await;
        assert_eq!(registry.latest("chat1").await, Some("abc111".to_string()));

        registry.append("chat1", "abc222".to_string()).await;
        assert_eq!(registry.latest("chat1").await, Some("abc222".to_string()));

        // 其他 chat 不受影响
        assert_eq!(registry.latest("chat2").await, None);
    }

    #[tokio::test]
    async fn test_prefix_returns_newest_match() {
        let registry = SessionRegistry::new();
        registry.append("chat1", "abc111".to_string()).await;
        registry.append("chat1", "abc222".to_string()).await;
        registry.append("chat1", "def333".to_string()).await;

        assert_eq!(
            registry.lookup_by_prefix("chat1", "abc").await,
            Some("abc222".to_string())
        );
        assert_eq!(
            registry.lookup_by_prefix("chat1", "def").await,
            Some("def333".to_string())
        );
    }

    #[tokio::test]
    async fn test_prefix_case_insensitive() {
        let registry = SessionRegistry::new();
        registry.append("chat1", "DeadBeef01".to_string()).await;
        assert_eq!(
            registry.lookup_by_prefix("chat1", "DEADB").await,
            Some("DeadBeef01".to_string())
        );
    }

    #[tokio::test]
    async fn test_prefix_absent_cases() {
        let registry = SessionRegistry::new();
        registry.append("chat1", "abc111".to_string()).await;

        assert_eq!(registry.lookup_by_prefix("chat1", "zzz").await, None);
        assert_eq!(registry.lookup_by_prefix("unknown", "abc").await, None);
    }

    #[tokio::test]
    async fn test_conversation_lock_is_per_chat() {
        let registry = SessionRegistry::new();
        let a1 = registry.conversation_lock("a").await;
        let a2 = registry.conversation_lock("a").await;
        let b = registry.conversation_lock("b").await;

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));

        // 持有 a 的锁不影响 b
        let _guard = a1.lock().await;
        assert!(b.try_lock().is_ok());
    }
}
