//! 可观测性：tracing 初始化，供嵌入本引擎的传输层二进制在启动时调用

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化 tracing：RUST_LOG 可覆盖，默认本 crate INFO
pub fn init() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env().add_directive("claude_relay=info".parse().unwrap()),
        )
        .with(fmt::layer())
        .init();
}
