//! 扶正瓶子并举到一侧
//!
//! 瓶子横放在桌面中部，朝向决定用哪只臂；抓起、抬升后把瓶底送到同侧的高处并松开。
//! 失败注入在编译计划之前决定，注入时参数被扰动且放置后不松爪。

use async_trait::async_trait;
use nalgebra::Vector3;
use rand::Rng;

use crate::core::EpisodeError;
use crate::episode::{SceneSetup, Session, Stage};
use crate::geometry::{ArmTag, PlaceTarget};
use crate::injection::FailureInjectionPolicy;
use crate::placement::{PlacementConstraints, PoseSampler};
use crate::plan::{GraspSpec, PlaceSpec};
use crate::sim::{ActorId, ActorSpec};
use crate::success::SuccessPredicate;

use super::spawned;

const MODEL: &str = "001_bottle";
const MODEL_IDS: [u32; 2] = [13, 16];
const BOTTLE_Z: f64 = 0.752;
const PADDING: f64 = 0.15;

/// 左右两种摆放：瓶口朝向、采样范围、目标位姿
const QUATS: [[f64; 4]; 2] = [[0.707, 0.0, 0.0, -0.707], [0.707, 0.0, 0.0, 0.707]];
const XLIMS: [[f64; 2]; 2] = [[-0.12, -0.08], [0.08, 0.12]];
const YLIM: [f64; 2] = [-0.13, -0.08];
const TARGETS: [[f64; 7]; 2] = [
    [-0.25, -0.12, 0.95, 0.0, 1.0, 0.0, 0.0],
    [0.25, -0.12, 0.95, 0.0, 1.0, 0.0, 0.0],
];

pub struct AdjustBottle {
    policy: FailureInjectionPolicy,
    bottle: Option<ActorId>,
    model_id: u32,
    arm: ArmTag,
}

impl AdjustBottle {
    pub fn new(policy: FailureInjectionPolicy) -> Self {
        Self {
            policy,
            bottle: None,
            model_id: MODEL_IDS[0],
            arm: ArmTag::Left,
        }
    }
}

#[async_trait]
impl Stage for AdjustBottle {
    fn name(&self) -> &'static str {
        "adjust_bottle"
    }

    fn setup(&mut self, scene: &mut SceneSetup<'_>) -> Result<(), EpisodeError> {
        let tag = scene.ctx.rng.gen_range(0..2usize);
        self.model_id = MODEL_IDS[scene.ctx.rng.gen_range(0..MODEL_IDS.len())];
        self.arm = if tag == 1 { ArmTag::Right } else { ArmTag::Left };

        let sampler = PoseSampler::new(XLIMS[tag], YLIM)
            .with_z(BOTTLE_Z)
            .with_base(QUATS[tag])
            .with_rotation([0.0, 0.0, 0.4]);
        let pose = scene.place(&sampler, &PlacementConstraints::new());
        let bottle = scene.spawn(ActorSpec::new(MODEL, self.model_id, pose))?;
        scene.prohibit(bottle, PADDING)?;
        self.bottle = Some(bottle);

        scene.add_success(
            self.name(),
            SuccessPredicate::LiftedAside {
                actor: bottle,
                functional_point: 0,
                side: self.arm,
                arm: self.arm,
                min_abs_x: 0.15,
                min_height: 0.9,
            },
        );
        Ok(())
    }

    async fn play(&mut self, session: &mut Session<'_>) -> Result<(), EpisodeError> {
        let bottle = spawned(self.bottle, self.name())?;
        let arm = self.arm;

        let decision = self.policy.decide(&mut session.ctx.rng);
        session.ctx.injected = Some(decision.active);
        let params = decision.params;

        let compiler = session.compiler();
        let grasp = compiler.grasp_actor(bottle, arm, GraspSpec::new().pre_grasp(params.pre_grasp_dis))?;
        session.move_arms(grasp).await;
        session
            .displace(arm, Vector3::new(0.0, 0.0, params.lift_height))
            .await;

        let target = params.apply_to(PlaceTarget::from(TARGETS[arm.index()]));
        let place = session.compiler().place_actor(
            bottle,
            target,
            arm,
            PlaceSpec::new()
                .functional_point(0)
                .distances(0.0, 0.02)
                .open(params.release),
        )?;
        session.move_arms(place).await;

        session
            .ctx
            .info
            .insert("{A}", format!("{MODEL}/base{}", self.model_id));
        session.ctx.info.insert("{a}", arm.as_str());
        Ok(())
    }
}
