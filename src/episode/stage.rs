//! 任务阶段抽象
//!
//! 组合任务由若干阶段依次组成。每个阶段在 `setup` 中采样放置物体、登记禁放区与成功判据，
//! 在 `play` 中编译并调度动作。两个阶段共享同一个 [`EpisodeContext`]。

use async_trait::async_trait;
use nalgebra::Vector3;

use crate::config::AppConfig;
use crate::core::EpisodeError;
use crate::episode::EpisodeContext;
use crate::geometry::{ArmTag, Pose};
use crate::placement::{sample_placement, PlacementConstraints, PoseSampler};
use crate::plan::{ActionPlan, ArmPlan, ArmScheduler, MoveFrame, PlanCompiler};
use crate::sim::{ActorId, ActorSpec, SimBackend, Simulator};
use crate::success::SuccessPredicate;

#[async_trait]
pub trait Stage: Send {
    fn name(&self) -> &'static str;

    /// 搭建场景：只在 episode 开始时调用一次
    fn setup(&mut self, scene: &mut SceneSetup<'_>) -> Result<(), EpisodeError>;

    /// 执行动作
    async fn play(&mut self, session: &mut Session<'_>) -> Result<(), EpisodeError>;
}

/// 场景搭建期间的访问入口
pub struct SceneSetup<'a> {
    pub ctx: &'a mut EpisodeContext,
    pub sim: &'a dyn Simulator,
    pub config: &'a AppConfig,
}

impl<'a> SceneSetup<'a> {
    pub fn new(ctx: &'a mut EpisodeContext, sim: &'a dyn Simulator, config: &'a AppConfig) -> Self {
        Self { ctx, sim, config }
    }

    /// 配置中的双臂中线间隙
    pub fn centerline(&self) -> f64 {
        self.config.sampling.centerline_clearance
    }

    /// 拒绝采样一个放置位姿并记入本 episode 的已接受列表
    pub fn place(&mut self, sampler: &PoseSampler, constraints: &PlacementConstraints) -> Pose {
        let placement = sample_placement(
            &mut self.ctx.rng,
            sampler,
            constraints,
            &self.ctx.placements,
            &self.ctx.registry,
            self.config.sampling.attempt_budget,
        );
        if placement.exhausted {
            self.ctx.sampling_exhausted += 1;
        }
        self.ctx.placements.push(placement.pose.xy());
        placement.pose
    }

    pub fn spawn(&mut self, spec: ActorSpec) -> Result<ActorId, EpisodeError> {
        Ok(self.sim.spawn_actor(spec)?)
    }

    /// 按物体地面投影加 padding 登记禁放区
    pub fn prohibit(&mut self, actor: ActorId, padding: f64) -> Result<(), EpisodeError> {
        let pose = self.sim.actor_pose(actor)?;
        let half = self.sim.footprint(actor)?;
        self.ctx.registry.register_around(pose.xy(), half, padding);
        Ok(())
    }

    pub fn prohibit_bounds(&mut self, bounds: [f64; 4]) {
        self.ctx.registry.register_bounds(bounds);
    }

    pub fn add_success(&mut self, name: &str, predicate: SuccessPredicate) -> usize {
        self.ctx.evaluator.add_stage(name, predicate)
    }
}

/// 动作执行期间的访问入口
pub struct Session<'a> {
    pub ctx: &'a mut EpisodeContext,
    backend: &'a dyn SimBackend,
    pub config: &'a AppConfig,
}

impl<'a> Session<'a> {
    pub fn new(ctx: &'a mut EpisodeContext, backend: &'a dyn SimBackend, config: &'a AppConfig) -> Self {
        Self {
            ctx,
            backend,
            config,
        }
    }

    pub fn sim(&self) -> &'a dyn Simulator {
        self.backend.as_simulator()
    }

    /// 读取当前仿真状态的编译器；每一步调度之后都要重新编译
    pub fn compiler(&self) -> PlanCompiler<'a> {
        PlanCompiler::new(self.backend.as_simulator()).with_apertures(
            self.config.scheduler.gripper_open,
            self.config.scheduler.gripper_closed,
        )
    }

    /// 调度一步并把结果并入 episode 的 plan_success
    ///
    /// plan_success 已为 false 时不再下发动作，直接返回 false。
    pub async fn move_arms(&mut self, plan: impl Into<ActionPlan> + Send) -> bool {
        let plan = plan.into();
        if !self.ctx.plan_success {
            tracing::debug!(arms = ?plan.arms(), "plan already failed, skipping step");
            return false;
        }
        let report = ArmScheduler::new(self.backend.as_executor())
            .dispatch(&plan)
            .await;
        self.ctx.plan_success &= report.plan_success;
        report.plan_success
    }

    /// 两只臂同时执行
    pub async fn move_both(&mut self, first: ArmPlan, second: ArmPlan) -> Result<bool, EpisodeError> {
        let plan = ActionPlan::pair(first, second)?;
        Ok(self.move_arms(plan).await)
    }

    /// 世界系下的相对位移
    pub async fn displace(&mut self, arm: ArmTag, delta: Vector3<f64>) -> bool {
        let plan = self.compiler().move_by_displacement(arm, delta, MoveFrame::World);
        self.move_arms(plan).await
    }

    pub fn check_stage(&mut self, index: usize) -> Result<bool, EpisodeError> {
        let sim = self.backend.as_simulator();
        Ok(self.ctx.evaluator.check_stage(index, sim, None)?)
    }
}
