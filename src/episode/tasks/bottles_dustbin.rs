//! 三个瓶子扔进垃圾桶
//!
//! 垃圾桶固定在桌面左侧外沿，只有左臂够得到。左半边的瓶子由左臂直接抓起扔进去；
//! 右半边的瓶子先由右臂送到中间，再交给左臂。

use std::cmp::Ordering;

use async_trait::async_trait;
use nalgebra::{Vector2, Vector3};

use crate::core::EpisodeError;
use crate::episode::{SceneSetup, Session, Stage};
use crate::geometry::{ArmTag, Pose};
use crate::placement::{PlacementConstraints, PoseSampler};
use crate::plan::{Action, ArmPlan, GraspSpec, PlaceSpec};
use crate::sim::{ActorId, ActorSpec};
use crate::success::SuccessPredicate;

const BOTTLE_MODEL: &str = "114_bottle";
const BOTTLE_IDS: [u32; 3] = [1, 2, 3];
const DUSTBIN_MODEL: &str = "011_dustbin";
const DUSTBIN_POSE: [f64; 7] = [-0.45, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5];
/// 交接位置
const RIGHT_MIDDLE_POSE: [f64; 7] = [0.0, 0.0, 0.88, 0.0, 1.0, 0.0, 0.0];
/// 左臂在垃圾桶上方松手的位姿
const LEFT_END_POSE: [f64; 7] = [-0.35, -0.1, 0.93, 0.65, -0.25, 0.25, 0.65];
const LIFT: f64 = 0.1;
/// 交接时两只夹爪在瓶身上错开的高度
const HANDOVER_SHIFT: f64 = 0.06;

pub struct PutBottlesDustbin {
    bottles: Vec<ActorId>,
}

impl PutBottlesDustbin {
    pub fn new() -> Self {
        Self {
            bottles: Vec::new(),
        }
    }

    async fn left_drop(&self, session: &mut Session<'_>, bottle: ActorId) -> Result<(), EpisodeError> {
        let grasp = session
            .compiler()
            .grasp_actor(bottle, ArmTag::Left, GraspSpec::new().pre_grasp(0.1))?;
        session.move_arms(grasp).await;
        session
            .displace(ArmTag::Left, Vector3::new(0.0, 0.0, LIFT))
            .await;
        session.move_arms(left_to_end()).await;
        Ok(())
    }

    async fn handover(&self, session: &mut Session<'_>, bottle: ActorId) -> Result<(), EpisodeError> {
        let compiler = session.compiler();
        let right_grasp = compiler
            .grasp_actor(bottle, ArmTag::Right, GraspSpec::new().pre_grasp(0.1))?
            .shift_moves(Vector3::new(0.0, 0.0, HANDOVER_SHIFT));
        let left_home = compiler.back_to_origin(ArmTag::Left);
        session.move_both(right_grasp, left_home).await?;
        session
            .displace(ArmTag::Right, Vector3::new(0.0, 0.0, LIFT))
            .await;

        let to_middle = session.compiler().place_actor(
            bottle,
            Pose::from_array(RIGHT_MIDDLE_POSE).into(),
            ArmTag::Right,
            PlaceSpec::new()
                .functional_point(0)
                .distances(0.0, 0.0)
                .align()
                .open(false),
        )?;
        session.move_arms(to_middle).await;

        let left_grasp = session
            .compiler()
            .grasp_actor(bottle, ArmTag::Left, GraspSpec::new().pre_grasp(0.1))?
            .shift_moves(Vector3::new(0.0, 0.0, -HANDOVER_SHIFT));
        session.move_arms(left_grasp).await;
        let release = session.compiler().open_gripper(ArmTag::Right);
        session.move_arms(release).await;

        let right_home = session.compiler().back_to_origin(ArmTag::Right);
        session.move_both(left_to_end(), right_home).await?;
        Ok(())
    }
}

impl Default for PutBottlesDustbin {
    fn default() -> Self {
        Self::new()
    }
}

fn left_to_end() -> ArmPlan {
    ArmPlan::new(
        ArmTag::Left,
        vec![Action::move_to(ArmTag::Left, Pose::from_array(LEFT_END_POSE))],
    )
}

#[async_trait]
impl Stage for PutBottlesDustbin {
    fn name(&self) -> &'static str {
        "put_bottles_dustbin"
    }

    fn setup(&mut self, scene: &mut SceneSetup<'_>) -> Result<(), EpisodeError> {
        let sampler = PoseSampler::new([-0.25, 0.3], [0.03, 0.23]).with_base([0.707, 0.707, 0.0, 0.0]);
        let constraints = PlacementConstraints::new()
            .centerline(scene.centerline())
            .min_distance(0.13);

        self.bottles.clear();
        for model_id in BOTTLE_IDS {
            let pose = scene.place(&sampler, &constraints);
            let bottle = scene.spawn(ActorSpec::new(BOTTLE_MODEL, model_id, pose))?;
            self.bottles.push(bottle);
        }
        for bottle in &self.bottles {
            scene.prohibit(*bottle, 0.1)?;
        }

        scene.spawn(ActorSpec::new(DUSTBIN_MODEL, 0, Pose::from_array(DUSTBIN_POSE)).fixed())?;

        scene.add_success(
            self.name(),
            SuccessPredicate::ActorsInRegion {
                actors: self.bottles.clone(),
                center: Vector2::new(DUSTBIN_POSE[0], DUSTBIN_POSE[1]),
                eps: Vector2::new(0.221, 0.325),
                z_range: [0.2, 0.7],
            },
        );
        Ok(())
    }

    async fn play(&mut self, session: &mut Session<'_>) -> Result<(), EpisodeError> {
        if self.bottles.is_empty() {
            return Err(EpisodeError::InvalidStep(format!(
                "stage '{}' played before setup",
                self.name()
            )));
        }

        // 先左后右，同侧按 y 从近到远
        let mut order = Vec::with_capacity(self.bottles.len());
        for bottle in &self.bottles {
            order.push((*bottle, session.sim().actor_pose(*bottle)?.position));
        }
        order.sort_by(|(_, a), (_, b)| {
            (a.x > 0.0)
                .cmp(&(b.x > 0.0))
                .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
        });

        for (bottle, position) in order {
            match ArmTag::nearest_to(position.x) {
                ArmTag::Left => self.left_drop(session, bottle).await?,
                ArmTag::Right => self.handover(session, bottle).await?,
            }
            let release = session.compiler().open_gripper(ArmTag::Left);
            session.move_arms(release).await;
            tracing::debug!(bottle = %bottle, plan_success = session.ctx.plan_success, "bottle dropped");
        }

        let info = &mut session.ctx.info;
        for (key, model_id) in ["{A}", "{B}", "{C}"].into_iter().zip(BOTTLE_IDS) {
            info.insert(key, format!("{BOTTLE_MODEL}/base{model_id}"));
        }
        info.insert("{D}", format!("{DUSTBIN_MODEL}/base0"));
        session.ctx.last_arm = Some(ArmTag::Left);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::episode::EpisodeContext;
    use crate::sim::MockSimulator;

    #[tokio::test]
    async fn test_all_bottles_end_in_dustbin() {
        for seed in [0, 7, 21] {
            let sim = MockSimulator::with_default_catalog();
            let config = AppConfig::default();
            let mut ctx = EpisodeContext::new(seed);
            let mut stage = PutBottlesDustbin::new();
            stage
                .setup(&mut SceneSetup::new(&mut ctx, &sim, &config))
                .unwrap();
            stage
                .play(&mut Session::new(&mut ctx, &sim, &config))
                .await
                .unwrap();

            assert!(ctx.plan_success, "seed {seed}");
            assert!(ctx.evaluator.evaluate(&sim, None).unwrap(), "seed {seed}");
            for arm in ArmTag::BOTH {
                assert!(sim.held_by(arm).is_none());
            }
            assert_eq!(ctx.info.get("{D}"), Some("011_dustbin/base0"));
        }
    }

    #[tokio::test]
    async fn test_play_before_setup_is_rejected() {
        let sim = MockSimulator::with_default_catalog();
        let config = AppConfig::default();
        let mut ctx = EpisodeContext::new(0);
        let mut stage = PutBottlesDustbin::new();
        let err = stage
            .play(&mut Session::new(&mut ctx, &sim, &config))
            .await
            .unwrap_err();
        assert!(matches!(err, EpisodeError::InvalidStep(_)));
        assert!(sim.action_log().is_empty());
    }
}
