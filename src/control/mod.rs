//! 重试 / 回退控制器
//!
//! 面向“收敛驱动”的操作（如转动铰链门）：按策略反复推动并读取关节位置，停滞或规划失败时切换到回退策略。
//! 策略表按物体类别配置，见 [`RetryProfile`]。

pub mod controller;
pub mod profile;

pub use controller::{
    ArticulationDriver, ControllerOutcome, ControllerState, RetryController, StrategyRole,
};
pub use profile::{default_profiles, ApproachStep, RetryProfile, StrategySpec};
