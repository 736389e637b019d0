//! 子进程执行：spawn、限时等待、强制终止、流捕获
//!
//! 引擎唯一的挂起点。不同 chat 的调用各自 spawn、各有超时钟，互不串行；
//! 超时先 kill 再在宽限期内等退出，超时输出视为不可靠、整体丢弃。
//! 通过 CommandRunner trait 抽象，测试用桩实现替换真实子进程。

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// kill 之后等待子进程真正退出的宽限期
const KILL_GRACE: Duration = Duration::from_secs(5);

/// 单次执行的结局分类
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// 正常跑完（含非零退出码，由上层定性）
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// 超过墙钟预算，子进程已被终止，输出丢弃
    TimedOut,
    /// 进程没能启动（二进制缺失、权限不足等）
    SpawnFailed(String),
}

/// 命令执行接口（测试桩的接缝）
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], limit: Duration) -> RunOutcome;
}

/// 真实子进程执行器
#[derive(Debug, Default)]
pub struct SubprocessRunner;

#[async_trait]
impl CommandRunner for SubprocessRunner {
    async fn run(&self, program: &str, args: &[String], limit: Duration) -> RunOutcome {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return RunOutcome::SpawnFailed(e.to_string()),
        };

        // 与 wait 并发排空两条管道，避免子进程写满缓冲卡死
        let Some(mut stdout_pipe) = child.stdout.take() else {
            return RunOutcome::SpawnFailed("stdout pipe unavailable".to_string());
        };
        let Some(mut stderr_pipe) = child.stderr.take() else {
            return RunOutcome::SpawnFailed("stderr pipe unavailable".to_string());
        };
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            buf
        });

        match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                let exit_code = status.code().unwrap_or(-1);
                debug!(program = %program, exit_code, "child completed");
                RunOutcome::Completed {
                    exit_code,
                    stdout: String::from_utf8_lossy(&stdout).to_string(),
                    stderr: String::from_utf8_lossy(&stderr).to_string(),
                }
            }
            Ok(Err(e)) => {
                stdout_task.abort();
                stderr_task.abort();
                RunOutcome::SpawnFailed(e.to_string())
            }
            Err(_) => {
                warn!(program = %program, limit_secs = limit.as_secs(), "child timed out, killing");
                let _ = child.start_kill();
                if timeout(KILL_GRACE, child.wait()).await.is_err() {
                    warn!(program = %program, "child did not exit within kill grace period");
                }
                stdout_task.abort();
                stderr_task.abort();
                RunOutcome::TimedOut
            }
        }
    }
}
