//! 打开微波炉门
//!
//! 左臂按重试策略表里的 `microwave` 条目推门：主策略转把手，不收敛时切到回退策略推门缘。
//! 收敛判定就是本阶段登记的成功判据。

use async_trait::async_trait;
use nalgebra::Vector3;
use rand::Rng;

use crate::control::{ApproachStep, ArticulationDriver, RetryController, RetryProfile};
use crate::core::EpisodeError;
use crate::episode::{SceneSetup, Session, Stage};
use crate::geometry::ArmTag;
use crate::placement::{PlacementConstraints, PoseSampler};
use crate::plan::GraspSpec;
use crate::sim::{ActorId, ActorSpec};
use crate::success::SuccessPredicate;

use super::spawned;

const MODEL: &str = "044_microwave";
const MODEL_IDS: [u32; 2] = [0, 1];

pub struct OpenMicrowave {
    controller: RetryController,
    microwave: Option<ActorId>,
    model_id: u32,
    success: usize,
}

impl OpenMicrowave {
    const ARM: ArmTag = ArmTag::Left;

    pub fn new(profile: RetryProfile, epsilon: f64) -> Self {
        Self {
            controller: RetryController::new(profile, epsilon),
            microwave: None,
            model_id: MODEL_IDS[0],
            success: 0,
        }
    }
}

/// 把控制器的抽象步骤落到编译器和调度器上
struct DoorDriver<'s, 'a> {
    session: &'s mut Session<'a>,
    actor: ActorId,
    arm: ArmTag,
    success: usize,
}

impl<'s, 'a> DoorDriver<'s, 'a> {
    async fn grasp(&mut self, spec: GraspSpec) -> Result<bool, EpisodeError> {
        let plan = self.session.compiler().grasp_actor(self.actor, self.arm, spec)?;
        Ok(self.session.move_arms(plan).await)
    }
}

#[async_trait]
impl<'s, 'a> ArticulationDriver for DoorDriver<'s, 'a> {
    async fn approach(&mut self, step: &ApproachStep) -> Result<bool, EpisodeError> {
        match step {
            ApproachStep::OpenGripper => {
                let plan = self.session.compiler().open_gripper(self.arm);
                Ok(self.session.move_arms(plan).await)
            }
            ApproachStep::Displace { x, y, z } => Ok(self
                .session
                .displace(self.arm, Vector3::new(*x, *y, *z))
                .await),
            ApproachStep::Grasp {
                contact_point,
                pre_grasp_dis,
                grasp_dis,
            } => {
                let spec = GraspSpec::new()
                    .contact_point(*contact_point)
                    .pre_grasp(*pre_grasp_dis)
                    .grasp(*grasp_dis);
                self.grasp(spec).await
            }
        }
    }

    async fn push(&mut self, contact_point_id: usize) -> Result<bool, EpisodeError> {
        self.grasp(GraspSpec::press(contact_point_id)).await
    }

    fn joint_position(&self) -> Result<f64, EpisodeError> {
        Ok(self.session.sim().joint_position(self.actor)?)
    }

    fn converged(&mut self) -> Result<bool, EpisodeError> {
        self.session.check_stage(self.success)
    }

    fn reset_plan_success(&mut self) {
        self.session.ctx.plan_success = true;
    }
}

#[async_trait]
impl Stage for OpenMicrowave {
    fn name(&self) -> &'static str {
        "open_microwave"
    }

    fn setup(&mut self, scene: &mut SceneSetup<'_>) -> Result<(), EpisodeError> {
        self.model_id = MODEL_IDS[scene.ctx.rng.gen_range(0..MODEL_IDS.len())];
        let sampler = PoseSampler::new([-0.12, -0.02], [0.25, 0.3])
            .with_z(0.8)
            .with_base([0.707, 0.0, 0.0, 0.707]);
        let pose = scene.place(&sampler, &PlacementConstraints::new().ignore_zones());
        let microwave = scene.spawn(ActorSpec::new(MODEL, self.model_id, pose).fixed())?;
        scene.prohibit(microwave, 0.0)?;
        scene.prohibit_bounds([-0.25, -0.25, 0.25, 0.1]);
        self.microwave = Some(microwave);

        let threshold = scene.config.retry.success_threshold;
        self.success = scene.add_success(
            self.name(),
            SuccessPredicate::JointOpened {
                actor: microwave,
                threshold,
            },
        );
        Ok(())
    }

    async fn play(&mut self, session: &mut Session<'_>) -> Result<(), EpisodeError> {
        let microwave = spawned(self.microwave, self.name())?;
        let mut driver = DoorDriver {
            session: &mut *session,
            actor: microwave,
            arm: Self::ARM,
            success: self.success,
        };
        let outcome = self.controller.run(&mut driver).await?;
        tracing::info!(
            final_state = ?outcome.final_state,
            iterations = outcome.iterations,
            switched = outcome.switched(),
            "microwave controller finished"
        );

        session
            .ctx
            .info
            .insert("{A}", format!("{MODEL}/base{}", self.model_id));
        session.ctx.info.insert("{a}", Self::ARM.as_str());
        session.ctx.last_arm = Some(Self::ARM);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::control::ControllerState;
    use crate::episode::EpisodeContext;
    use crate::sim::{MockSimulator, Simulator};

    fn profile(config: &AppConfig) -> RetryProfile {
        config.retry.profile("microwave").unwrap()
    }

    #[tokio::test]
    async fn test_door_opens_through_fallback() {
        let sim = MockSimulator::with_default_catalog();
        let config = AppConfig::default();
        let mut ctx = EpisodeContext::new(9);
        let mut stage = OpenMicrowave::new(profile(&config), config.retry.epsilon);
        stage
            .setup(&mut SceneSetup::new(&mut ctx, &sim, &config))
            .unwrap();
        let door = stage.microwave.unwrap();

        let mut session = Session::new(&mut ctx, &sim, &config);
        let mut driver = DoorDriver {
            session: &mut session,
            actor: door,
            arm: ArmTag::Left,
            success: stage.success,
        };
        let outcome = stage.controller.run(&mut driver).await.unwrap();

        assert!(outcome.converged());
        assert!(outcome.switched());
        assert!(outcome.trace.contains(&ControllerState::Stalled));
        assert!(ctx.plan_success);
        assert!(ctx.evaluator.is_latched(stage.success));
        assert!(sim.joint_position(door).unwrap() >= 0.84);
    }

    #[tokio::test]
    async fn test_failed_plans_exhaust_both_strategies() {
        let sim = MockSimulator::with_default_catalog();
        let config = AppConfig::default();
        let mut ctx = EpisodeContext::new(9);
        let mut stage = OpenMicrowave::new(profile(&config), config.retry.epsilon);
        stage
            .setup(&mut SceneSetup::new(&mut ctx, &sim, &config))
            .unwrap();
        sim.fail_after(ArmTag::Left, 0);

        let mut session = Session::new(&mut ctx, &sim, &config);
        let mut driver = DoorDriver {
            session: &mut session,
            actor: stage.microwave.unwrap(),
            arm: ArmTag::Left,
            success: stage.success,
        };
        let outcome = stage.controller.run(&mut driver).await.unwrap();

        // 主策略的接近步骤失败后切换，回退策略同样无法执行
        assert!(outcome.switched());
        assert!(outcome.trace.contains(&ControllerState::PlanFailed));
        assert_eq!(outcome.final_state, ControllerState::Exhausted);
        assert_eq!(outcome.iterations, 0);
        assert!(!ctx.plan_success);
    }
}
