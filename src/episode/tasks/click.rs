//! 按闹钟、按铃
//!
//! 两个静态物体分放在桌面两侧附近，各用离得近的那只臂从上方按下再抬起。
//! 按下后立即检查一次接触判据，抬起后再检查一次；任一次满足即锁存。

use async_trait::async_trait;
use nalgebra::Vector3;
use rand::Rng;

use crate::core::EpisodeError;
use crate::episode::{SceneSetup, Session, Stage};
use crate::geometry::{ArmTag, Pose};
use crate::placement::{PlacementConstraints, PoseSampler};
use crate::plan::{Action, ArmPlan, GraspSpec};
use crate::sim::{ActorId, ActorSpec};
use crate::success::SuccessPredicate;

use super::spawned;

const UPRIGHT: [f64; 4] = [0.5, 0.5, 0.5, 0.5];
const PRESS_CHECK_Z: f64 = 0.03;

/// 按下、检查、抬起、检查
async fn press_and_check(
    session: &mut Session<'_>,
    arm: ArmTag,
    depth: f64,
    success: usize,
) -> Result<(), EpisodeError> {
    session.displace(arm, Vector3::new(0.0, 0.0, -depth)).await;
    session.check_stage(success)?;
    session.displace(arm, Vector3::new(0.0, 0.0, depth)).await;
    session.check_stage(success)?;
    Ok(())
}

pub struct ClickAlarmClock {
    alarm: Option<ActorId>,
    model_id: u32,
    arm: ArmTag,
    success: usize,
}

impl ClickAlarmClock {
    const MODEL: &'static str = "046_alarm-clock";
    const MODEL_IDS: [u32; 2] = [1, 3];
    const PRESS_DEPTH: f64 = 0.065;
    /// 按压时的末端姿态：侧向夹爪，指尖朝下
    const PRESS_QUAT: [f64; 4] = [0.5, -0.5, 0.5, 0.5];

    pub fn new() -> Self {
        Self {
            alarm: None,
            model_id: Self::MODEL_IDS[0],
            arm: ArmTag::Left,
            success: 0,
        }
    }
}

impl Default for ClickAlarmClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ClickAlarmClock {
    fn name(&self) -> &'static str {
        "click_alarmclock"
    }

    fn setup(&mut self, scene: &mut SceneSetup<'_>) -> Result<(), EpisodeError> {
        let sampler = PoseSampler::new([-0.25, 0.25], [-0.2, 0.0])
            .with_base(UPRIGHT)
            .with_rotation([0.0, 3.14, 0.0]);
        let constraints = PlacementConstraints::new().centerline(scene.centerline());
        let pose = scene.place(&sampler, &constraints);

        self.model_id = Self::MODEL_IDS[scene.ctx.rng.gen_range(0..Self::MODEL_IDS.len())];
        let alarm = scene.spawn(ActorSpec::new(Self::MODEL, self.model_id, pose).fixed())?;
        scene.prohibit(alarm, 0.05)?;
        self.alarm = Some(alarm);
        self.arm = ArmTag::nearest_to(pose.position.x);

        self.success = scene.add_success(
            self.name(),
            SuccessPredicate::ContactPress {
                actor: alarm,
                contact_point: 0,
                arm: self.arm,
                eps_xy: [0.03, 0.03],
                eps_z: PRESS_CHECK_Z,
            },
        );
        Ok(())
    }

    async fn play(&mut self, session: &mut Session<'_>) -> Result<(), EpisodeError> {
        let alarm = spawned(self.alarm, self.name())?;
        let arm = self.arm;

        // 只取接触点上方的位置，末端姿态固定
        let above = session.compiler().get_grasp_pose(alarm, arm, 0, 0.1)?;
        let approach = ArmPlan::new(
            arm,
            vec![
                Action::move_to(arm, Pose::new(above.position, Pose::quat(Self::PRESS_QUAT))),
                Action::close(arm, session.config.scheduler.gripper_closed),
            ],
        );
        session.move_arms(approach).await;
        press_and_check(session, arm, Self::PRESS_DEPTH, self.success).await?;

        session
            .ctx
            .info
            .insert("{A}", format!("{}/base{}", Self::MODEL, self.model_id));
        session.ctx.info.insert("{a}", arm.as_str());
        session.ctx.last_arm = Some(arm);
        session.ctx.last_actor = Some(alarm);
        Ok(())
    }
}

pub struct ClickBell {
    bell: Option<ActorId>,
    model_id: u32,
    arm: ArmTag,
    success: usize,
}

impl ClickBell {
    const MODEL: &'static str = "050_bell";
    const MODEL_IDS: [u32; 2] = [0, 1];
    const PRESS_DEPTH: f64 = 0.045;
    /// 与闹钟的最小间距
    const MIN_DISTANCE: f64 = 0.15;

    pub fn new() -> Self {
        Self {
            bell: None,
            model_id: Self::MODEL_IDS[0],
            arm: ArmTag::Left,
            success: 0,
        }
    }
}

impl Default for ClickBell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ClickBell {
    fn name(&self) -> &'static str {
        "click_bell"
    }

    fn setup(&mut self, scene: &mut SceneSetup<'_>) -> Result<(), EpisodeError> {
        let sampler = PoseSampler::new([-0.25, 0.25], [-0.2, 0.0]).with_base(UPRIGHT);
        let constraints = PlacementConstraints::new()
            .centerline(scene.centerline())
            .min_distance(Self::MIN_DISTANCE);
        let pose = scene.place(&sampler, &constraints);

        self.model_id = Self::MODEL_IDS[scene.ctx.rng.gen_range(0..Self::MODEL_IDS.len())];
        let bell = scene.spawn(ActorSpec::new(Self::MODEL, self.model_id, pose).fixed())?;
        scene.prohibit(bell, 0.07)?;
        self.bell = Some(bell);
        self.arm = ArmTag::nearest_to(pose.position.x);

        self.success = scene.add_success(
            self.name(),
            SuccessPredicate::ContactPress {
                actor: bell,
                contact_point: 0,
                arm: self.arm,
                eps_xy: [0.025, 0.025],
                eps_z: PRESS_CHECK_Z,
            },
        );
        Ok(())
    }

    async fn play(&mut self, session: &mut Session<'_>) -> Result<(), EpisodeError> {
        let bell = spawned(self.bell, self.name())?;
        let arm = self.arm;

        let grasp = session
            .compiler()
            .grasp_actor(bell, arm, GraspSpec::new().pre_grasp(0.1).grasp(0.1))?;
        session.move_arms(grasp).await;
        press_and_check(session, arm, Self::PRESS_DEPTH, self.success).await?;

        session
            .ctx
            .info
            .insert("{B}", format!("{}/base{}", Self::MODEL, self.model_id));
        session.ctx.info.insert("{b}", arm.as_str());
        session.ctx.last_arm = Some(arm);
        session.ctx.last_actor = Some(bell);
        Ok(())
    }
}
