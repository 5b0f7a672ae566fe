//! 纯运动学的内存仿真端
//!
//! 没有物理：移动立即到位，闭合夹爪时吸附附近的物体，张开时释放；释放点落在容器开口上方时物体落到容器底部。
//! 铰接物体在指定接触点被按压时关节按固定步长增加，可设置上限以模拟“推不动”。
//! 模型参考点定义在“竖直”坐标系（z 向上）下，`upright` 是让模型竖直摆放的基准姿态。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use nalgebra::{UnitQuaternion, Vector2, Vector3};

use crate::core::SimError;
use crate::geometry::{ArmTag, Pose};
use crate::placement::sampler::TABLE_HEIGHT;
use crate::plan::{Action, ActionCommand};
use crate::sim::{ActorId, ActorSpec, MotionExecutor, PointKind, Simulator};

/// 闭合时可吸附的接触点距离
const GRASP_RADIUS: f64 = 0.1;
/// 按压铰接物体时末端需要贴合接触点的距离
const PRESS_RADIUS: f64 = 0.01;
/// 夹爪指尖相对末端向下的偏移
const FINGER_LENGTH: f64 = 0.04;
/// 指尖与接触点在此距离内记为接触
const CONTACT_RADIUS: f64 = 0.06;
/// 开度低于此值视为闭合
pub const GRIPPER_CLOSED_BELOW: f64 = 0.5;

/// 铰接关节上某个接触点的推动增益
#[derive(Debug, Clone, PartialEq)]
pub struct PushGain {
    pub contact_point: usize,
    pub step: f64,
    /// 通过该接触点最多推到的位置
    pub cap: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointModel {
    pub limit: f64,
    pub pushes: Vec<PushGain>,
}

/// 容器开口（地面投影）与底部高度
#[derive(Debug, Clone, PartialEq)]
pub struct Receptacle {
    pub half_extents: Vector2<f64>,
    pub floor_z: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub upright: UnitQuaternion<f64>,
    /// 可用的模型编号；为空时不限制
    pub model_ids: Vec<u32>,
    pub contact_points: Vec<Pose>,
    pub functional_points: Vec<Pose>,
    pub half_extents: Vector2<f64>,
    pub joint: Option<JointModel>,
    pub receptacle: Option<Receptacle>,
}

impl ModelInfo {
    fn new(upright: [f64; 4], half_extents: [f64; 2]) -> Self {
        Self {
            upright: Pose::quat(upright),
            model_ids: Vec::new(),
            contact_points: Vec::new(),
            functional_points: Vec::new(),
            half_extents: Vector2::from(half_extents),
            joint: None,
            receptacle: None,
        }
    }

    fn ids(mut self, ids: &[u32]) -> Self {
        self.model_ids = ids.to_vec();
        self
    }

    fn contact(mut self, point: [f64; 7]) -> Self {
        self.contact_points.push(Pose::from_array(point));
        self
    }

    fn functional(mut self, point: [f64; 7]) -> Self {
        self.functional_points.push(Pose::from_array(point));
        self
    }

    fn accepts(&self, model_id: u32) -> bool {
        self.model_ids.is_empty() || self.model_ids.contains(&model_id)
    }

    fn graspable(&self) -> bool {
        self.joint.is_none() && self.receptacle.is_none()
    }
}

/// 模型名 → 模型信息
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: HashMap<String, ModelInfo>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, info: ModelInfo) {
        self.models.insert(name.into(), info);
    }

    pub fn get(&self, name: &str) -> Option<&ModelInfo> {
        self.models.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ModelInfo> {
        self.models.remove(name)
    }

    /// 任务目录用到的全部模型
    pub fn default_catalog() -> Self {
        // 自上而下接近的接触点姿态：局部 z 朝下
        const DOWN: [f64; 4] = [0.0, 1.0, 0.0, 0.0];
        let at = |x: f64, y: f64, z: f64, q: [f64; 4]| [x, y, z, q[0], q[1], q[2], q[3]];

        let mut catalog = Self::new();
        catalog.insert(
            "001_bottle",
            ModelInfo::new([1.0, 0.0, 0.0, 0.0], [0.04, 0.04])
                .ids(&[13, 16])
                .contact(at(0.0, 0.0, 0.06, DOWN))
                .functional(at(0.0, 0.0, 0.0, [1.0, 0.0, 0.0, 0.0])),
        );
        catalog.insert(
            "114_bottle",
            ModelInfo::new([0.707, 0.707, 0.0, 0.0], [0.035, 0.035])
                .ids(&[1, 2, 3])
                .contact(at(0.0, 0.0, 0.1, DOWN))
                .functional(at(0.0, 0.0, 0.0, DOWN)),
        );
        let mut dustbin = ModelInfo::new([0.5, 0.5, 0.5, 0.5], [0.2, 0.3]).ids(&[0]);
        dustbin.receptacle = Some(Receptacle {
            half_extents: Vector2::new(0.2, 0.3),
            floor_z: 0.3,
        });
        catalog.insert("011_dustbin", dustbin);
        catalog.insert(
            "046_alarm-clock",
            ModelInfo::new([0.5, 0.5, 0.5, 0.5], [0.05, 0.05])
                .ids(&[1, 3])
                .contact(at(0.0, 0.0, 0.08, DOWN)),
        );
        catalog.insert(
            "050_bell",
            ModelInfo::new([0.5, 0.5, 0.5, 0.5], [0.06, 0.06])
                .ids(&[0, 1])
                .contact(at(0.0, 0.0, 0.07, DOWN)),
        );
        catalog.insert(
            "box",
            ModelInfo::new([1.0, 0.0, 0.0, 0.0], [0.025, 0.025])
                .contact(at(0.0, 0.0, 0.025, DOWN))
                .functional(at(0.0, 0.0, -0.025, DOWN))
                .functional(at(0.0, 0.0, 0.025, DOWN)),
        );
        // 把手 cp0、门缘 cp1 / cp2、转轴附近 cp3、把手下沿 cp4
        let mut microwave = ModelInfo::new([1.0, 0.0, 0.0, 0.0], [0.2, 0.15])
            .ids(&[0, 1])
            .contact(at(-0.2, 0.15, 0.0, DOWN))
            .contact(at(-0.2, 0.1, 0.05, DOWN))
            .contact(at(-0.22, 0.05, 0.05, DOWN))
            .contact(at(-0.2, -0.15, 0.05, DOWN))
            .contact(at(-0.2, 0.15, 0.02, DOWN));
        microwave.joint = Some(JointModel {
            limit: 1.2,
            pushes: vec![
                PushGain {
                    contact_point: 4,
                    step: 0.05,
                    cap: 0.45,
                },
                PushGain {
                    contact_point: 2,
                    step: 0.06,
                    cap: 1.2,
                },
            ],
        });
        catalog.insert("044_microwave", microwave);
        catalog
    }
}

#[derive(Debug, Clone)]
struct MockActor {
    spec: ActorSpec,
    model: ModelInfo,
    pose: Pose,
    joint: f64,
}

impl MockActor {
    /// 竖直坐标系下的参考点换算到世界系
    fn world_point(&self, local: &Pose) -> Pose {
        let to_model = Pose::new(Vector3::zeros(), self.model.upright.inverse());
        self.pose.compose(&to_model).compose(local)
    }

    fn point(&self, id: ActorId, kind: PointKind, index: usize) -> Result<Pose, SimError> {
        let points = match kind {
            PointKind::Contact => &self.model.contact_points,
            PointKind::Functional => &self.model.functional_points,
        };
        points
            .get(index)
            .map(|p| self.world_point(p))
            .ok_or(SimError::UnknownPoint {
                actor: id,
                kind,
                id: index,
            })
    }
}

#[derive(Debug, Clone)]
struct ArmState {
    ee: Pose,
    aperture: f64,
    /// 被抓物体及其在末端坐标系下的位姿
    held: Option<(ActorId, Pose)>,
    executed: usize,
    fail_after: Option<usize>,
    delay: Duration,
}

impl ArmState {
    fn at_rest(arm: ArmTag) -> Self {
        Self {
            ee: rest_pose(arm),
            aperture: 1.0,
            held: None,
            executed: 0,
            fail_after: None,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
struct MockState {
    actors: Vec<MockActor>,
    arms: [ArmState; 2],
    log: Vec<Action>,
}

pub struct MockSimulator {
    catalog: ModelCatalog,
    state: Mutex<MockState>,
}

fn rest_pose(arm: ArmTag) -> Pose {
    let x = match arm {
        ArmTag::Left => -0.3,
        ArmTag::Right => 0.3,
    };
    Pose::from_array([x, -0.3, 0.95, 0.0, 1.0, 0.0, 0.0])
}

/// 机械臂可达的工作空间
fn reachable(p: &Vector3<f64>) -> bool {
    p.x.abs() <= 0.9 && p.y.abs() <= 0.7 && p.z >= TABLE_HEIGHT - 0.09 && p.z <= 1.4
}

impl MockSimulator {
    pub fn new(catalog: ModelCatalog) -> Self {
        Self {
            catalog,
            state: Mutex::new(MockState {
                actors: Vec::new(),
                arms: [ArmState::at_rest(ArmTag::Left), ArmState::at_rest(ArmTag::Right)],
                log: Vec::new(),
            }),
        }
    }

    pub fn with_default_catalog() -> Self {
        Self::new(ModelCatalog::default_catalog())
    }

    /// 每个动作执行前的等待时间
    pub fn with_arm_delay(self, arm: ArmTag, delay: Duration) -> Self {
        self.state().arms[arm.index()].delay = delay;
        self
    }

    /// 该臂成功执行 n 个动作后，后续动作全部规划失败
    pub fn fail_after(&self, arm: ArmTag, n: usize) {
        self.state().arms[arm.index()].fail_after = Some(n);
    }

    pub fn clear_failures(&self) {
        for arm in self.state().arms.iter_mut() {
            arm.fail_after = None;
        }
    }

    pub fn action_log(&self) -> Vec<Action> {
        self.state().log.clone()
    }

    pub fn executed(&self, arm: ArmTag) -> usize {
        self.state().arms[arm.index()].executed
    }

    pub fn held_by(&self, arm: ArmTag) -> Option<ActorId> {
        self.state().arms[arm.index()].held.map(|(id, _)| id)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_actor<T>(
        &self,
        actor: ActorId,
        f: impl FnOnce(&MockActor) -> Result<T, SimError>,
    ) -> Result<T, SimError> {
        let state = self.state();
        let a = state
            .actors
            .get(actor.0 as usize)
            .ok_or(SimError::UnknownActor(actor))?;
        f(a)
    }
}

impl Simulator for MockSimulator {
    fn spawn_actor(&self, spec: ActorSpec) -> Result<ActorId, SimError> {
        let model = self
            .catalog
            .get(&spec.model)
            .filter(|m| m.accepts(spec.model_id))
            .cloned()
            .ok_or_else(|| SimError::MissingResource(spec.model_key()))?;
        let mut state = self.state();
        let id = ActorId(state.actors.len() as u32);
        tracing::debug!(actor = %id, model = %spec.model_key(), "spawn actor");
        state.actors.push(MockActor {
            pose: spec.pose,
            spec,
            model,
            joint: 0.0,
        });
        Ok(id)
    }

    fn reset(&self) {
        let mut state = self.state();
        state.actors.clear();
        state.log.clear();
        for arm in ArmTag::BOTH {
            let slot = &mut state.arms[arm.index()];
            let (fail_after, delay) = (slot.fail_after, slot.delay);
            *slot = ArmState::at_rest(arm);
            slot.fail_after = fail_after;
            slot.delay = delay;
        }
    }

    fn actor_pose(&self, actor: ActorId) -> Result<Pose, SimError> {
        self.with_actor(actor, |a| Ok(a.pose))
    }

    fn functional_point(&self, actor: ActorId, id: usize) -> Result<Pose, SimError> {
        self.with_actor(actor, |a| a.point(actor, PointKind::Functional, id))
    }

    fn contact_point(&self, actor: ActorId, id: usize) -> Result<Pose, SimError> {
        self.with_actor(actor, |a| a.point(actor, PointKind::Contact, id))
    }

    fn footprint(&self, actor: ActorId) -> Result<Vector2<f64>, SimError> {
        self.with_actor(actor, |a| Ok(a.model.half_extents))
    }

    fn joint_position(&self, actor: ActorId) -> Result<f64, SimError> {
        self.with_actor(actor, |a| match a.model.joint {
            Some(_) => Ok(a.joint),
            None => Err(SimError::NotArticulated(actor)),
        })
    }

    fn joint_limit(&self, actor: ActorId) -> Result<f64, SimError> {
        self.with_actor(actor, |a| match &a.model.joint {
            Some(joint) => Ok(joint.limit),
            None => Err(SimError::NotArticulated(actor)),
        })
    }

    fn grasp_pose(
        &self,
        actor: ActorId,
        _arm: ArmTag,
        contact_point_id: usize,
        pre_dis: f64,
    ) -> Result<Pose, SimError> {
        let cp = self.contact_point(actor, contact_point_id)?;
        Ok(cp.retreat(Vector3::z(), pre_dis))
    }

    fn end_effector_pose(&self, arm: ArmTag) -> Pose {
        self.state().arms[arm.index()].ee
    }

    fn rest_pose(&self, arm: ArmTag) -> Pose {
        rest_pose(arm)
    }

    fn gripper_aperture(&self, arm: ArmTag) -> f64 {
        self.state().arms[arm.index()].aperture
    }

    fn gripper_contacts(&self, actor: ActorId) -> Result<Vec<Vector3<f64>>, SimError> {
        let state = self.state();
        let a = state
            .actors
            .get(actor.0 as usize)
            .ok_or(SimError::UnknownActor(actor))?;
        let points: Vec<_> = a
            .model
            .contact_points
            .iter()
            .map(|p| a.world_point(p).position)
            .collect();
        Ok(state
            .arms
            .iter()
            .filter(|arm| arm.aperture < GRIPPER_CLOSED_BELOW)
            .map(|arm| arm.ee.position - Vector3::new(0.0, 0.0, FINGER_LENGTH))
            .filter(|tip| points.iter().any(|p| (p - tip).norm() <= CONTACT_RADIUS))
            .collect())
    }
}

#[async_trait]
impl MotionExecutor for MockSimulator {
    async fn execute_action(&self, action: &Action) -> bool {
        let idx = action.arm.index();
        let delay = self.state().arms[idx].delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut guard = self.state();
        let MockState { actors, arms, log } = &mut *guard;
        log.push(action.clone());

        if let Some(limit) = arms[idx].fail_after {
            if arms[idx].executed >= limit {
                return false;
            }
        }

        match &action.command {
            ActionCommand::Move { target } => {
                if !reachable(&target.position) {
                    tracing::warn!(arm = %action.arm, z = target.position.z, "target out of reach");
                    return false;
                }
                let arm = &mut arms[idx];
                arm.ee = *target;
                if let Some((id, in_ee)) = arm.held {
                    actors[id.0 as usize].pose = target.compose(&in_ee);
                }
            }
            ActionCommand::Open { aperture } => {
                let arm = &mut arms[idx];
                arm.aperture = *aperture;
                if let Some((id, _)) = arm.held.take() {
                    release(actors, id);
                }
            }
            ActionCommand::Close { aperture } => {
                arms[idx].aperture = *aperture;
                let ee = arms[idx].ee;
                if arms[idx].held.is_none() {
                    if let Some(id) = nearest_graspable(actors, &ee) {
                        let other = &mut arms[1 - idx];
                        if other.held.map(|(h, _)| h) == Some(id) {
                            other.held = None;
                        }
                        let in_ee = ee.inverse().compose(&actors[id.0 as usize].pose);
                        arms[idx].held = Some((id, in_ee));
                    }
                }
                press_joints(actors, &ee);
            }
        }
        arms[idx].executed += 1;
        true
    }
}

fn nearest_graspable(actors: &[MockActor], ee: &Pose) -> Option<ActorId> {
    actors
        .iter()
        .enumerate()
        .filter(|(_, a)| !a.spec.is_static && a.model.graspable())
        .filter_map(|(i, a)| {
            a.model
                .contact_points
                .iter()
                .map(|p| (a.world_point(p).position - ee.position).norm())
                .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))))
                .filter(|d| *d <= GRASP_RADIUS)
                .map(|d| (ActorId(i as u32), d))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

fn press_joints(actors: &mut [MockActor], ee: &Pose) {
    for actor in actors.iter_mut() {
        let Some(joint) = actor.model.joint.clone() else {
            continue;
        };
        for gain in &joint.pushes {
            let Some(cp) = actor.model.contact_points.get(gain.contact_point) else {
                continue;
            };
            if (actor.world_point(cp).position - ee.position).norm() <= PRESS_RADIUS {
                let cap = gain.cap.min(joint.limit);
                if actor.joint < cap {
                    actor.joint = (actor.joint + gain.step).min(cap);
                }
            }
        }
    }
}

/// 释放点在容器开口上方时落到容器底部，否则停在原处
fn release(actors: &mut [MockActor], id: ActorId) {
    let xy = actors[id.0 as usize].pose.xy();
    let floor = actors.iter().find_map(|a| {
        let r = a.model.receptacle.as_ref()?;
        let d = xy - a.pose.xy();
        (d.x.abs() < r.half_extents.x && d.y.abs() < r.half_extents.y).then_some(r.floor_z)
    });
    if let Some(z) = floor {
        actors[id.0 as usize].pose.position.z = z;
    }
}
