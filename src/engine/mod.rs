//! 中继引擎编排：start / resume 两个入口
//!
//! 流程：解析续接目标（仅 resume）→ 构建包装命令 → 限时执行 → 解析输出 →
//! 有新 session id 则追加并带上指纹行 → 截断到回复上限。失败一律转为
//! 单条用户可见文案，不重试、不外抛；同一 chat 全程持串行锁，
//! 不同 chat 并行互不影响。

pub mod builder;
pub mod error;
pub mod parser;
pub mod runner;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::session::SessionRegistry;
pub use error::RelayError;
use runner::{CommandRunner, RunOutcome, SubprocessRunner};

/// 回复截断时的结尾标记
const ELLIPSIS: &str = "...";
/// 指纹长度：session id 前 8 个字符
const FINGERPRINT_LEN: usize = 8;

/// 中继引擎：组合构建、执行、解析与会话注册表
pub struct RelayEngine {
    config: AppConfig,
    runner: Arc<dyn CommandRunner>,
    registry: Arc<SessionRegistry>,
}

impl RelayEngine {
    /// 真实子进程执行器
    pub fn new(config: AppConfig) -> Self {
        Self::with_runner(config, Arc::new(SubprocessRunner))
    }

    /// 注入执行器（测试桩接缝）
    pub fn with_runner(config: AppConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// 开新对话：不带 --resume 调用，返回最终（可能已截断）文案
    pub async fn start_new(&self, chat_key: &str, prompt: &str) -> String {
        let lock = self.registry.conversation_lock(chat_key).await;
        let _guard = lock.lock().await;

        match self.invoke(chat_key, prompt, None).await {
            Ok(text) => text,
            Err(e) => {
                warn!(chat = %chat_key, error = %e, "start_new failed");
                e.user_message()
            }
        }
    }

    /// 续接对话
    ///
    /// raw_args 首词形如十六进制且后面还有词 → 按前缀查找目标 session；
    /// 否则整个参数列表是 prompt，目标为该 chat 最近的 session。
    /// 两种未命中（SessionNotFound / NoActiveSession）都不会 spawn 进程。
    pub async fn resume(&self, chat_key: &str, raw_args: &[String]) -> String {
        let lock = self.registry.conversation_lock(chat_key).await;
        let _guard = lock.lock().await;

        let (session_id, prompt) = match self.resolve_target(chat_key, raw_args).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(chat = %chat_key, error = %e, "resume target not resolved");
                return e.user_message();
            }
        };

        match self.invoke(chat_key, &prompt, Some(&session_id)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(chat = %chat_key, error = %e, "resume failed");
                e.user_message()
            }
        }
    }

    /// 解析续接目标：(目标 session id, prompt 文本)
    async fn resolve_target(
        &self,
        chat_key: &str,
        raw_args: &[String],
    ) -> Result<(String, String), RelayError> {
        if raw_args.len() >= 2 && is_hex_token(&raw_args[0]) {
            let prefix = &raw_args[0];
            match self.registry.lookup_by_prefix(chat_key, prefix).await {
                Some(id) => Ok((id, raw_args[1..].join(" "))),
                None => Err(RelayError::SessionNotFound(prefix.clone())),
            }
        } else {
            match self.registry.latest(chat_key).await {
                Some(id) => Ok((id, raw_args.join(" "))),
                None => Err(RelayError::NoActiveSession),
            }
        }
    }

    /// 单次调用：构建 → 执行 → 解析 → 追加 session → 指纹 → 截断
    ///
    /// 调用方必须已持有该 chat 的串行锁。
    async fn invoke(
        &self,
        chat_key: &str,
        prompt: &str,
        resume_session_id: Option<&str>,
    ) -> Result<String, RelayError> {
        let (program, args) = builder::build_command(
            prompt,
            resume_session_id,
            &self.config.claude,
            &self.config.wrapper,
        );
        let limit = Duration::from_secs(self.config.claude.timeout_secs);

        let start = Instant::now();
        let outcome = self.runner.run(&program, &args, limit).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome_tag = match &outcome {
            RunOutcome::Completed { exit_code: 0, .. } => "ok",
            RunOutcome::Completed { .. } => "nonzero_exit",
            RunOutcome::TimedOut => "timeout",
            RunOutcome::SpawnFailed(_) => "spawn_failed",
        };
        info!(
            chat = %chat_key,
            resumed = resume_session_id.is_some(),
            outcome = outcome_tag,
            duration_ms,
            "claude invocation"
        );

        match outcome {
            RunOutcome::SpawnFailed(cause) => Err(RelayError::SpawnFailed(cause)),
            RunOutcome::TimedOut => Err(RelayError::TimedOut(self.config.claude.timeout_secs)),
            RunOutcome::Completed {
                exit_code, stderr, ..
            } if exit_code != 0 => Err(RelayError::NonZeroExit {
                code: exit_code,
                stderr: clip_chars(stderr.trim(), self.config.relay.stderr_limit),
            }),
            RunOutcome::Completed { stdout, .. } => {
                let parsed = parser::parse(&stdout);
                let mut text = parsed.text;

                // CLI 每轮可能轮换 id，续接后同样追加新 id（总是 append）
                if let Some(id) = parsed.session_id {
                    self.registry.append(chat_key, id.clone()).await;
                    let fingerprint: String = id.chars().take(FINGERPRINT_LEN).collect();
                    text.push_str(&format!("\n\nsession: {}", fingerprint));
                }

                Ok(truncate_reply(text, self.config.relay.max_reply_chars))
            }
        }
    }
}

/// 首词是否像 session 前缀（^[0-9a-f]+$，大小写不敏感）
fn is_hex_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// 超过上限截为「上限-3 个字符 + ...」，总长恰为上限
fn truncate_reply(text: String, ceiling: usize) -> String {
    if text.chars().count() <= ceiling {
        return text;
    }
    let mut clipped: String = text
        .chars()
        .take(ceiling.saturating_sub(ELLIPSIS.len()))
        .collect();
    clipped.push_str(ELLIPSIS);
    clipped
}

/// 按字符数裁剪（stderr 预览用，不加标记）
fn clip_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        s.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hex_token() {
        assert!(is_hex_token("deadbeef"));
        assert!(is_hex_token("DEADbeef01"));
        assert!(!is_hex_token(""));
        assert!(!is_hex_token("xyz"));
        assert!(!is_hex_token("dead beef"));
        assert!(!is_hex_token("dead-beef"));
    }

    #[test]
    fn test_truncate_boundary() {
        // 恰好等于上限不截
        let exact = "a".repeat(100);
        assert_eq!(truncate_reply(exact.clone(), 100), exact);

        // 超过上限：总长恰为上限，末三位是 ...
        let long = "b".repeat(101);
        let out = truncate_reply(long, 100);
        assert_eq!(out.chars().count(), 100);
        assert!(out.ends_with("..."));
        assert_eq!(&out[..97], &"b".repeat(97));
    }

    #[test]
    fn test_truncate_multibyte() {
        let long = "汉".repeat(50);
        let out = truncate_reply(long, 20);
        assert_eq!(out.chars().count(), 20);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_clip_chars() {
        assert_eq!(clip_chars("short", 10), "short");
        assert_eq!(clip_chars("0123456789", 4), "0123");
    }
}
