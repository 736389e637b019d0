//! claude-relay - 聊天触发的 Claude CLI 中继引擎
//!
//! 接收已鉴权的 `(chat_key, prompt, 可选会话引用)`，在另一个执行上下文
//! （nsenter 跨命名空间 + su 切换账户）内调用 Claude CLI，解析结构化输出，
//! 并按会话维护可续接的 session id 历史。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量 `CLAUDE_RELAY__*`）
//! - **engine**: 编排器、命令构建、子进程执行、结果解析、错误类型
//! - **observability**: tracing 初始化（供嵌入方调用）
//! - **session**: 按会话的 session id 历史与前缀查找
//!
//! 传输层绑定（Telegram 等）、指标采集、白名单鉴权均由外部协作方负责，
//! 本 crate 只做执行与会话续接。

pub mod config;
pub mod engine;
pub mod observability;
pub mod session;

pub use config::{load_config, AppConfig};
pub use engine::runner::{CommandRunner, RunOutcome, SubprocessRunner};
pub use engine::{RelayEngine, RelayError};
pub use session::SessionRegistry;
