//! 双臂同步调度器
//!
//! 一次调用接收一到两只臂的计划，各臂的动作序列独立下发给运动执行器并发推进；
//! 调用在所有臂都结束（完成或失败）后才返回，即汇合屏障而非竞速。
//! 某只臂规划失败时放弃该臂剩余动作，但仍等待另一只臂跑完；调度器自身不重试、没有超时。

use futures_util::future::join_all;

use crate::geometry::ArmTag;
use crate::plan::{ActionPlan, ArmPlan};
use crate::sim::MotionExecutor;

/// 单臂执行报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmReport {
    pub arm: ArmTag,
    /// 成功到达目标的动作数
    pub completed: usize,
    pub total: usize,
    pub success: bool,
}

/// 一次调度的汇合结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub arms: Vec<ArmReport>,
    /// 每只臂的每个动作都到达目标时为 true
    pub plan_success: bool,
}

impl StepReport {
    pub fn arm(&self, arm: ArmTag) -> Option<&ArmReport> {
        self.arms.iter().find(|r| r.arm == arm)
    }
}

pub struct ArmScheduler<'a> {
    executor: &'a dyn MotionExecutor,
}

impl<'a> ArmScheduler<'a> {
    pub fn new(executor: &'a dyn MotionExecutor) -> Self {
        Self { executor }
    }

    /// 并发执行各臂计划并在屏障处汇合
    pub async fn dispatch(&self, plan: &ActionPlan) -> StepReport {
        let arms = join_all(plan.plans().iter().map(|p| self.run_arm(p))).await;
        let plan_success = arms.iter().all(|r| r.success);

        let audit = serde_json::json!({
            "event": "step_audit",
            "arms": arms
                .iter()
                .map(|r| serde_json::json!({
                    "arm": r.arm.as_str(),
                    "completed": r.completed,
                    "total": r.total,
                    "ok": r.success,
                }))
                .collect::<Vec<_>>(),
            "plan_success": plan_success,
        });
        tracing::debug!(audit = %audit.to_string(), "step");

        StepReport { arms, plan_success }
    }

    async fn run_arm(&self, plan: &ArmPlan) -> ArmReport {
        let total = plan.len();
        for (index, action) in plan.actions.iter().enumerate() {
            if !self.executor.execute_action(action).await {
                tracing::warn!(
                    arm = %plan.arm,
                    action = index,
                    verb = ?action.verb(),
                    "motion planning failed, abandoning the rest of the arm plan"
                );
                return ArmReport {
                    arm: plan.arm,
                    completed: index,
                    total,
                    success: false,
                };
            }
        }
        ArmReport {
            arm: plan.arm,
            completed: total,
            total,
            success: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::geometry::Pose;
    use crate::plan::Action;

    /// 每只臂可设置单步耗时与失败位置的执行器，记录完成顺序
    #[derive(Default)]
    struct ScriptedExecutor {
        delays_ms: HashMap<ArmTag, u64>,
        fail_at: HashMap<ArmTag, usize>,
        counters: Mutex<HashMap<ArmTag, usize>>,
        finished: Mutex<Vec<ArmTag>>,
    }

    #[async_trait]
    impl MotionExecutor for ScriptedExecutor {
        async fn execute_action(&self, action: &Action) -> bool {
            let delay = self.delays_ms.get(&action.arm).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let index = {
                let mut counters = self.counters.lock().unwrap();
                let c = counters.entry(action.arm).or_insert(0);
                *c += 1;
                *c - 1
            };
            if self.fail_at.get(&action.arm) == Some(&index) {
                return false;
            }
            self.finished.lock().unwrap().push(action.arm);
            true
        }
    }

    fn moves(arm: ArmTag, n: usize) -> ArmPlan {
        ArmPlan::new(
            arm,
            (0..n).map(|_| Action::move_to(arm, Pose::default())).collect(),
        )
    }

    #[tokio::test]
    async fn test_single_arm_success() {
        let executor = ScriptedExecutor::default();
        let scheduler = ArmScheduler::new(&executor);
        let report = scheduler.dispatch(&moves(ArmTag::Left, 3).into()).await;
        assert!(report.plan_success);
        assert_eq!(report.arm(ArmTag::Left).unwrap().completed, 3);
    }

    #[tokio::test]
    async fn test_barrier_waits_for_slow_arm() {
        let executor = ScriptedExecutor {
            delays_ms: HashMap::from([(ArmTag::Left, 1), (ArmTag::Right, 20)]),
            ..Default::default()
        };
        let scheduler = ArmScheduler::new(&executor);
        let plan = ActionPlan::pair(moves(ArmTag::Left, 2), moves(ArmTag::Right, 3)).unwrap();
        let report = scheduler.dispatch(&plan).await;

        assert!(report.plan_success);
        // 返回时慢臂的全部动作都已完成
        let finished = executor.finished.lock().unwrap();
        assert_eq!(finished.iter().filter(|a| **a == ArmTag::Right).count(), 3);
        assert_eq!(finished.last(), Some(&ArmTag::Right));
    }

    #[tokio::test]
    async fn test_left_failure_still_joins_right() {
        let executor = ScriptedExecutor {
            delays_ms: HashMap::from([(ArmTag::Right, 10)]),
            fail_at: HashMap::from([(ArmTag::Left, 1)]),
            ..Default::default()
        };
        let scheduler = ArmScheduler::new(&executor);
        let plan = ActionPlan::pair(moves(ArmTag::Left, 3), moves(ArmTag::Right, 2)).unwrap();
        let report = scheduler.dispatch(&plan).await;

        assert!(!report.plan_success);
        let left = report.arm(ArmTag::Left).unwrap();
        assert_eq!((left.completed, left.success), (1, false));
        let right = report.arm(ArmTag::Right).unwrap();
        assert_eq!((right.completed, right.total, right.success), (2, 2, true));
        // 左臂失败后剩余动作被放弃
        assert_eq!(executor.counters.lock().unwrap()[&ArmTag::Left], 2);
    }

    #[tokio::test]
    async fn test_arms_run_concurrently() {
        let executor = ScriptedExecutor {
            delays_ms: HashMap::from([(ArmTag::Left, 50), (ArmTag::Right, 50)]),
            ..Default::default()
        };
        let scheduler = ArmScheduler::new(&executor);
        let plan = ActionPlan::pair(moves(ArmTag::Left, 2), moves(ArmTag::Right, 2)).unwrap();

        let start = std::time::Instant::now();
        let report = scheduler.dispatch(&plan).await;
        assert!(report.plan_success);
        // 串行需要 200ms，并发约 100ms
        assert!(start.elapsed() < Duration::from_millis(180));
    }
}
