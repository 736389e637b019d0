//! 命令构建：把 (prompt, 续接 id, 配置) 变成安全的 argv
//!
//! 两层包装固定套在载荷外：nsenter 进锚点进程的 mount/UTS/IPC/net 命名空间，
//! su 切到目标账户并以 `-c <string>` 执行。`-c` 的字符串由载荷 token 逐个
//! shell 转义后拼接（shell-words），用户文本里的反引号、`$()`、引号、换行
//! 都只能是字面量——这是主要的注入面，转义必须滴水不漏。
//!
//! 纯函数、无副作用，相同输入产出相同 argv。

use crate::config::{ClaudeSection, WrapperSection};

/// 载荷 argv（未转义的逻辑 token 序列）
///
/// 顺序固定：二进制、`-p <prompt>`、`--output-format json`、
/// 可选 `--append-system-prompt`、可选 `--dangerously-skip-permissions`
/// （仅 unattended 显式开启时）、逐项 `--allowedTools`、可选 `--resume <id>`。
pub fn payload_tokens(
    prompt: &str,
    resume_session_id: Option<&str>,
    claude: &ClaudeSection,
) -> Vec<String> {
    let mut argv = vec![
        claude.binary.clone(),
        "-p".to_string(),
        prompt.to_string(),
        "--output-format".to_string(),
        "json".to_string(),
    ];

    if let Some(sp) = claude.system_prompt.as_deref() {
        if !sp.is_empty() {
            argv.push("--append-system-prompt".to_string());
            argv.push(sp.to_string());
        }
    }

    if claude.unattended {
        argv.push("--dangerously-skip-permissions".to_string());
    }

    for tool in &claude.allowed_tools {
        argv.push("--allowedTools".to_string());
        argv.push(tool.clone());
    }

    if let Some(id) = resume_session_id {
        argv.push("--resume".to_string());
        argv.push(id.to_string());
    }

    argv
}

/// 完整调用：返回 (程序, 参数列表)
///
/// 程序为 nsenter；su 作为其子命令，载荷作为 su 的 `-c` 字符串。
pub fn build_command(
    prompt: &str,
    resume_session_id: Option<&str>,
    claude: &ClaudeSection,
    wrapper: &WrapperSection,
) -> (String, Vec<String>) {
    let payload = shell_words::join(payload_tokens(prompt, resume_session_id, claude));

    let args = vec![
        "-t".to_string(),
        wrapper.anchor_pid.to_string(),
        "-m".to_string(),
        "-u".to_string(),
        "-i".to_string(),
        "-n".to_string(),
        "--".to_string(),
        wrapper.su_binary.clone(),
        "-".to_string(),
        wrapper.account.clone(),
        "-c".to_string(),
        payload,
    ];

    (wrapper.nsenter_binary.clone(), args)
}
