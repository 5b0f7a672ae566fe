//! 运行监管：批量 episode 的取消
//!
//! 持有 CancellationToken，Ctrl+C 时触发；批量运行器在两个 episode 之间检查，
//! 正在执行的 episode 会跑完当前步（调度器自身没有超时与中断）。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RunSupervisor {
    cancel_token: CancellationToken,
}

impl RunSupervisor {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 安装 Ctrl+C 处理器
    pub fn install_signal_handler(self: &Arc<Self>) {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, stopping after the current episode...");
                supervisor.cancel();
            }
        });
    }
}

impl Default for RunSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
