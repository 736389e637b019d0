//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CLAUDE_RELAY__*` 覆盖
//! （双下划线表示嵌套，如 `CLAUDE_RELAY__CLAUDE__TIMEOUT_SECS=300`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub claude: ClaudeSection,
    #[serde(default)]
    pub wrapper: WrapperSection,
    #[serde(default)]
    pub relay: RelaySection,
}

/// [claude] 段：CLI 路径、超时与调用开关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClaudeSection {
    /// Claude CLI 可执行文件（在目标账户的 PATH 内解析）
    #[serde(default = "default_claude_binary")]
    pub binary: String,
    /// 单次调用的墙钟超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 跳过交互式权限确认（--dangerously-skip-permissions）。
    /// 默认关闭；只有显式配置为 true 才会附加该旗标。
    #[serde(default)]
    pub unattended: bool,
    /// 追加的 system prompt，未设置或为空则不传
    pub system_prompt: Option<String>,
    /// 允许 CLI 使用的工具名，逐项传 --allowedTools
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

fn default_claude_binary() -> String {
    "claude".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ClaudeSection {
    fn default() -> Self {
        Self {
            binary: default_claude_binary(),
            timeout_secs: default_timeout_secs(),
            unattended: false,
            system_prompt: None,
            allowed_tools: Vec::new(),
        }
    }
}

/// [wrapper] 段：跨命名空间与切换账户两层包装
///
/// 中继进程与 Claude CLI 不在同一命名空间/账户下运行，
/// 每次调用都无条件套上 nsenter（锚定 PID 的 mount/UTS/IPC/net）与 su。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WrapperSection {
    #[serde(default = "default_nsenter_binary")]
    pub nsenter_binary: String,
    /// 命名空间锚点进程 PID（-t 参数）
    #[serde(default = "default_anchor_pid")]
    pub anchor_pid: u32,
    #[serde(default = "default_su_binary")]
    pub su_binary: String,
    /// 实际执行 CLI 的账户名
    #[serde(default = "default_account")]
    pub account: String,
}

fn default_nsenter_binary() -> String {
    "nsenter".to_string()
}

fn default_anchor_pid() -> u32 {
    1
}

fn default_su_binary() -> String {
    "su".to_string()
}

fn default_account() -> String {
    "claude".to_string()
}

impl Default for WrapperSection {
    fn default() -> Self {
        Self {
            nsenter_binary: default_nsenter_binary(),
            anchor_pid: default_anchor_pid(),
            su_binary: default_su_binary(),
            account: default_account(),
        }
    }
}

/// [relay] 段：回复上限与 stderr 预览长度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// 单条回复的字符上限（超出截断为上限-3 + "..."）
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
    /// 非零退出时透出的 stderr 字符上限
    #[serde(default = "default_stderr_limit")]
    pub stderr_limit: usize,
}

fn default_max_reply_chars() -> usize {
    4096
}

fn default_stderr_limit() -> usize {
    500
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            max_reply_chars: default_max_reply_chars(),
            stderr_limit: default_stderr_limit(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            claude: ClaudeSection::default(),
            wrapper: WrapperSection::default(),
            relay: RelaySection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 CLAUDE_RELAY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CLAUDE_RELAY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CLAUDE_RELAY")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
