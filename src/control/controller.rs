//! 收敛 / 回退状态机
//!
//! INIT → ITERATING(主策略) → {CONVERGED, STALLED, PLAN_FAILED, BUDGET_SPENT}；
//! 主策略未收敛时 → SWITCH_STRATEGY → ITERATING(回退策略) → {CONVERGED, EXHAUSTED}。
//! 每次迭代：在推动接触点做一次贴合按压，读取关节位置，先判收敛再判停滞（Δ ≤ ε）。
//! 总迭代次数不超过主、回退两个策略上限之和。

use async_trait::async_trait;
use serde::Serialize;

use crate::control::{ApproachStep, RetryProfile, StrategySpec};
use crate::core::EpisodeError;

/// 控制器驱动的被操作对象，由 episode 层实现（编译计划 + 调度 + 读取关节）
#[async_trait]
pub trait ArticulationDriver: Send {
    /// 执行一个接近步骤；false 表示规划失败
    async fn approach(&mut self, step: &ApproachStep) -> Result<bool, EpisodeError>;

    /// 在接触点做一次按压推动；false 表示规划失败
    async fn push(&mut self, contact_point_id: usize) -> Result<bool, EpisodeError>;

    fn joint_position(&self) -> Result<f64, EpisodeError>;

    /// 外部几何阈值判定
    fn converged(&mut self) -> Result<bool, EpisodeError>;

    /// 切换策略时清除 episode 的规划失败标记
    fn reset_plan_success(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyRole {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Init,
    Iterating(StrategyRole),
    Converged,
    Stalled,
    PlanFailed,
    /// 策略迭代上限用完仍未收敛
    BudgetSpent,
    SwitchStrategy,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerOutcome {
    /// Converged 或 Exhausted
    pub final_state: ControllerState,
    /// 全部策略的推动次数
    pub iterations: usize,
    pub trace: Vec<ControllerState>,
}

impl ControllerOutcome {
    pub fn converged(&self) -> bool {
        self.final_state == ControllerState::Converged
    }

    pub fn switched(&self) -> bool {
        self.trace.contains(&ControllerState::SwitchStrategy)
    }
}

pub struct RetryController {
    profile: RetryProfile,
    epsilon: f64,
}

impl RetryController {
    pub fn new(profile: RetryProfile, epsilon: f64) -> Self {
        Self { profile, epsilon }
    }

    pub fn profile(&self) -> &RetryProfile {
        &self.profile
    }

    pub async fn run<D>(&self, driver: &mut D) -> Result<ControllerOutcome, EpisodeError>
    where
        D: ArticulationDriver + ?Sized,
    {
        let mut trace = vec![ControllerState::Init];
        let mut iterations = 0;

        let end = self
            .run_strategy(&self.profile.primary, StrategyRole::Primary, driver, &mut trace, &mut iterations)
            .await?;
        if end == ControllerState::Converged || driver.converged()? {
            return Ok(finish(ControllerState::Converged, iterations, trace));
        }

        let Some(fallback) = &self.profile.fallback else {
            tracing::warn!(strategy = %self.profile.primary.name, ?end, "no fallback strategy configured");
            return Ok(finish(ControllerState::Exhausted, iterations, trace));
        };

        tracing::info!(
            from = %self.profile.primary.name,
            to = %fallback.name,
            ?end,
            "primary strategy did not converge, switching"
        );
        trace.push(ControllerState::SwitchStrategy);
        driver.reset_plan_success();

        let end = self
            .run_strategy(fallback, StrategyRole::Fallback, driver, &mut trace, &mut iterations)
            .await?;
        let final_state = if end == ControllerState::Converged || driver.converged()? {
            ControllerState::Converged
        } else {
            ControllerState::Exhausted
        };
        Ok(finish(final_state, iterations, trace))
    }

    async fn run_strategy<D>(
        &self,
        spec: &StrategySpec,
        role: StrategyRole,
        driver: &mut D,
        trace: &mut Vec<ControllerState>,
        iterations: &mut usize,
    ) -> Result<ControllerState, EpisodeError>
    where
        D: ArticulationDriver + ?Sized,
    {
        trace.push(ControllerState::Iterating(role));

        for step in &spec.approach {
            if !driver.approach(step).await? {
                tracing::warn!(strategy = %spec.name, ?step, "approach failed");
                trace.push(ControllerState::PlanFailed);
                return Ok(ControllerState::PlanFailed);
            }
        }

        let mut last = driver.joint_position()?;
        for i in 0..spec.budget {
            *iterations += 1;
            if !driver.push(spec.push_contact_point).await? {
                tracing::warn!(strategy = %spec.name, iteration = i, "push failed");
                trace.push(ControllerState::PlanFailed);
                return Ok(ControllerState::PlanFailed);
            }
            let now = driver.joint_position()?;
            tracing::debug!(strategy = %spec.name, iteration = i, joint = now, "push");
            if driver.converged()? {
                trace.push(ControllerState::Converged);
                return Ok(ControllerState::Converged);
            }
            if now - last <= self.epsilon {
                trace.push(ControllerState::Stalled);
                return Ok(ControllerState::Stalled);
            }
            last = now;
        }

        trace.push(ControllerState::BudgetSpent);
        Ok(ControllerState::BudgetSpent)
    }
}

fn finish(final_state: ControllerState, iterations: usize, mut trace: Vec<ControllerState>) -> ControllerOutcome {
    if trace.last() != Some(&final_state) {
        trace.push(final_state);
    }
    ControllerOutcome {
        final_state,
        iterations,
        trace,
    }
}
