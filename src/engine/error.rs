//! 中继错误类型与面向用户的文案
//!
//! 解析失败不在此列：结构化解码失败回退为原始文本，按正常回复交付。
//! 所有失败对当前请求都是终态，不重试（CLI 调用昂贵且可能非幂等）。

use thiserror::Error;

/// 单次中继调用可能出现的错误
#[derive(Error, Debug)]
pub enum RelayError {
    /// 子进程无法启动（二进制缺失、权限不足等）
    #[error("failed to launch claude: {0}")]
    SpawnFailed(String),

    /// 超过墙钟超时，子进程已被终止
    #[error("claude timed out after {0}s")]
    TimedOut(u64),

    /// 子进程跑完但以非零码退出
    #[error("claude exited with code {code}")]
    NonZeroExit { code: i32, stderr: String },

    /// 前缀未命中任何已知 session
    #[error("no session matching prefix '{0}'")]
    SessionNotFound(String),

    /// 该 chat 还没有任何 session 可续接
    #[error("no active session for this chat")]
    NoActiveSession,
}

impl RelayError {
    /// 转为发回聊天的单条文案；引擎不向外抛未转换的错误
    pub fn user_message(&self) -> String {
        match self {
            RelayError::SpawnFailed(cause) => {
                format!("Error: could not start claude ({})", cause)
            }
            RelayError::TimedOut(secs) => {
                format!("Error: claude timed out after {}s", secs)
            }
            RelayError::NonZeroExit { code, stderr } => {
                if stderr.is_empty() {
                    format!("Error: claude exited with code {}", code)
                } else {
                    format!("Error: claude exited with code {}\n{}", code, stderr)
                }
            }
            RelayError::SessionNotFound(prefix) => format!(
                "No session starting with '{}'. Check the fingerprint shown after each reply.",
                prefix
            ),
            RelayError::NoActiveSession => {
                "No active session yet. Start a new conversation first, then resume it."
                    .to_string()
            }
        }
    }
}
