//! 错误恢复策略
//!
//! 根据 EpisodeError 返回 RecoveryAction，供批量运行器决定是跳过当前 episode 还是整体终止。
//! 只有资源缺失与取消会终止整批运行，其余错误只影响当前 episode。

use crate::core::{EpisodeError, RecoveryAction};

#[derive(Debug, Default)]
pub struct RecoveryPolicy;

impl RecoveryPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &EpisodeError) -> RecoveryAction {
        match err {
            EpisodeError::Sim(_) if err.is_missing_resource() => RecoveryAction::Abort,
            EpisodeError::Cancelled => RecoveryAction::Abort,
            EpisodeError::UnknownTask(_) | EpisodeError::Config(_) => RecoveryAction::Abort,
            EpisodeError::Sim(_) | EpisodeError::InvalidStep(_) => RecoveryAction::SkipEpisode,
        }
    }
}
