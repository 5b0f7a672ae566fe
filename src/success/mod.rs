//! 成功判定
//!
//! 判据是封闭的枚举，在搭建场景时按任务选定；每个阶段一个锁存位，一旦为真本 episode 内不再回落。
//! 组合任务的总判定按阶段执行顺序依次求与，遇到第一个未满足的阶段即停止。

use nalgebra::{Vector2, Vector3};
use serde::Serialize;

use crate::core::SimError;
use crate::geometry::ArmTag;
use crate::sim::mock::GRIPPER_CLOSED_BELOW;
use crate::sim::{ActorId, Simulator};

#[derive(Debug, Clone, PartialEq)]
pub enum SuccessPredicate {
    /// 用 `arm` 按压物体：夹爪闭合，且某个夹爪接触位置落在接触点附近
    ContactPress {
        actor: ActorId,
        contact_point: usize,
        arm: ArmTag,
        eps_xy: [f64; 2],
        eps_z: f64,
    },
    /// 铰接物体打开到上限的 `threshold` 比例以上
    JointOpened { actor: ActorId, threshold: f64 },
    /// 每个物体都在区域内且高度在区间内（如瓶子进了垃圾桶）
    ActorsInRegion {
        actors: Vec<ActorId>,
        center: Vector2<f64>,
        eps: Vector2<f64>,
        z_range: [f64; 2],
    },
    /// 按顺序逐个叠放，且两只夹爪都已张开
    Stacked {
        actors: Vec<ActorId>,
        spacing: f64,
        eps: Vector3<f64>,
    },
    /// 物体被举到一侧：功能点越过 `min_abs_x` 且高于 `min_height`，并已松开夹爪
    LiftedAside {
        actor: ActorId,
        functional_point: usize,
        side: ArmTag,
        arm: ArmTag,
        min_abs_x: f64,
        min_height: f64,
    },
}

fn gripper_open(sim: &dyn Simulator, arm: ArmTag) -> bool {
    sim.gripper_aperture(arm) >= GRIPPER_CLOSED_BELOW
}

impl SuccessPredicate {
    /// `threshold` 覆盖铰接判据的比例阈值
    pub fn holds(&self, sim: &dyn Simulator, threshold: Option<f64>) -> Result<bool, SimError> {
        match self {
            SuccessPredicate::ContactPress {
                actor,
                contact_point,
                arm,
                eps_xy,
                eps_z,
            } => {
                if gripper_open(sim, *arm) {
                    return Ok(false);
                }
                let target = sim.contact_point(*actor, *contact_point)?.position;
                Ok(sim.gripper_contacts(*actor)?.iter().any(|p| {
                    (p.x - target.x).abs() < eps_xy[0]
                        && (p.y - target.y).abs() < eps_xy[1]
                        && (p.z - target.z).abs() < *eps_z
                }))
            }
            SuccessPredicate::JointOpened { actor, threshold: own } => {
                let ratio = threshold.unwrap_or(*own);
                Ok(sim.joint_position(*actor)? >= sim.joint_limit(*actor)? * ratio)
            }
            SuccessPredicate::ActorsInRegion {
                actors,
                center,
                eps,
                z_range,
            } => {
                for actor in actors {
                    let p = sim.actor_pose(*actor)?.position;
                    let d = p.xy() - center;
                    let inside = d.x.abs() < eps.x
                        && d.y.abs() < eps.y
                        && p.z > z_range[0]
                        && p.z < z_range[1];
                    if !inside {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            SuccessPredicate::Stacked {
                actors,
                spacing,
                eps,
            } => {
                for pair in actors.windows(2) {
                    let below = sim.actor_pose(pair[0])?.position;
                    let above = sim.actor_pose(pair[1])?.position;
                    let d = above - (below + Vector3::new(0.0, 0.0, *spacing));
                    if d.x.abs() >= eps.x || d.y.abs() >= eps.y || d.z.abs() >= eps.z {
                        return Ok(false);
                    }
                }
                Ok(ArmTag::BOTH.iter().all(|arm| gripper_open(sim, *arm)))
            }
            SuccessPredicate::LiftedAside {
                actor,
                functional_point,
                side,
                arm,
                min_abs_x,
                min_height,
            } => {
                let fp = sim.functional_point(*actor, *functional_point)?.position;
                let aside = match side {
                    ArmTag::Left => fp.x < -min_abs_x,
                    ArmTag::Right => fp.x > *min_abs_x,
                };
                Ok(aside && fp.z > *min_height && gripper_open(sim, *arm))
            }
        }
    }
}

#[derive(Debug, Clone)]
struct StageLatch {
    name: String,
    predicate: SuccessPredicate,
    latched: bool,
}

/// 阶段锁存状态，用于输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageStatus {
    pub name: String,
    pub latched: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SuccessEvaluator {
    stages: Vec<StageLatch>,
}

impl SuccessEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个阶段，返回其下标
    pub fn add_stage(&mut self, name: impl Into<String>, predicate: SuccessPredicate) -> usize {
        self.stages.push(StageLatch {
            name: name.into(),
            predicate,
            latched: false,
        });
        self.stages.len() - 1
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn is_latched(&self, index: usize) -> bool {
        self.stages.get(index).is_some_and(|s| s.latched)
    }

    /// 判定单个阶段；已锁存时直接返回 true
    pub fn check_stage(
        &mut self,
        index: usize,
        sim: &dyn Simulator,
        threshold: Option<f64>,
    ) -> Result<bool, SimError> {
        let Some(stage) = self.stages.get_mut(index) else {
            tracing::warn!(index, "success check for unknown stage");
            return Ok(false);
        };
        if stage.latched {
            return Ok(true);
        }
        if stage.predicate.holds(sim, threshold)? {
            tracing::info!(stage = %stage.name, "stage success latched");
            stage.latched = true;
        }
        Ok(stage.latched)
    }

    /// 按登记顺序求与；没有阶段时为 true
    pub fn evaluate(&mut self, sim: &dyn Simulator, threshold: Option<f64>) -> Result<bool, SimError> {
        for index in 0..self.stages.len() {
            if !self.check_stage(index, sim, threshold)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn status(&self) -> Vec<StageStatus> {
        self.stages
            .iter()
            .map(|s| StageStatus {
                name: s.name.clone(),
                latched: s.latched,
            })
            .collect()
    }
}
