//! 错误类型与恢复动作
//!
//! 规划失败（plan_success = false）、采样耗尽、收敛停滞都不是错误，分别以布尔值、标记位、
//! 状态转移表达；这里只收录会中断 episode 的情况。与 RecoveryPolicy 配合决定跳过还是终止。

use thiserror::Error;

use crate::sim::{ActorId, PointKind};

/// 仿真 / 运动规划协作方返回的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// 资源缺失（模型、资产文件），致命，不重试
    #[error("Missing resource: {0}")]
    MissingResource(String),

    #[error("Unknown actor: {0}")]
    UnknownActor(ActorId),

    #[error("Actor {actor} has no {kind} point {id}")]
    UnknownPoint {
        actor: ActorId,
        kind: PointKind,
        id: usize,
    },

    #[error("Actor {0} has no articulated joint")]
    NotArticulated(ActorId),
}

/// Episode 运行过程中的错误
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    /// 同一步里给同一只臂提交了两份计划
    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Episode cancelled")]
    Cancelled,
}

impl EpisodeError {
    /// 是否为资源缺失（唯一需要中止整批运行的错误）
    pub fn is_missing_resource(&self) -> bool {
        matches!(self, EpisodeError::Sim(SimError::MissingResource(_)))
    }
}

/// 恢复策略根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 放弃当前 episode，继续下一个
    SkipEpisode,
    /// 终止整批运行
    Abort,
}
