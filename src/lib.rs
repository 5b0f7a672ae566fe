//! Dualarm - 双臂机器人操作 episode 编排
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **control**: 重试策略表与收敛 / 回退状态机
//! - **core**: 错误与恢复、episode 结果记录、运行监管
//! - **episode**: episode 状态、任务阶段、任务目录与批量运行器
//! - **geometry**: 位姿、放置目标与左右臂标识
//! - **injection**: 失败注入策略
//! - **observability**: 日志初始化
//! - **placement**: 位姿采样、禁放区与拒绝采样
//! - **plan**: 动作计划编译与双臂同步调度
//! - **sim**: 仿真后端接口与内存模拟实现
//! - **success**: 成功判据与阶段锁存

pub mod config;
pub mod control;
pub mod core;
pub mod episode;
pub mod geometry;
pub mod injection;
pub mod observability;
pub mod placement;
pub mod plan;
pub mod sim;
pub mod success;

pub use episode::{EpisodeRunner, TaskKind};
