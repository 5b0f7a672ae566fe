//! 仿真 / 运动规划协作方抽象
//!
//! 物理引擎、逆运动学与轨迹规划都不在本 crate 内：这里只定义编排层需要的查询接口（Simulator）
//! 与动作执行接口（MotionExecutor）。MockSimulator 是一个纯运动学的内存实现，供测试与本地运行。

pub mod mock;

use std::fmt;

use async_trait::async_trait;
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::SimError;
use crate::geometry::{ArmTag, Pose};
use crate::plan::Action;

pub use mock::{ModelCatalog, ModelInfo, MockSimulator};

/// 场景中物体的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// 物体模型上的命名参考点类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    /// 接触点：抓取 / 按压位姿由此计算
    Contact,
    /// 功能点：放置对齐时使用
    Functional,
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointKind::Contact => f.write_str("contact"),
            PointKind::Functional => f.write_str("functional"),
        }
    }
}

/// 场景搭建时创建物体的描述
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSpec {
    /// 模型名，如 `114_bottle`
    pub model: String,
    pub model_id: u32,
    pub pose: Pose,
    /// 静态物体不会被抓起
    pub is_static: bool,
}

impl ActorSpec {
    pub fn new(model: impl Into<String>, model_id: u32, pose: Pose) -> Self {
        Self {
            model: model.into(),
            model_id,
            pose,
            is_static: false,
        }
    }

    pub fn fixed(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// 指令模板里使用的模型标识，如 `114_bottle/base1`
    pub fn model_key(&self) -> String {
        format!("{}/base{}", self.model, self.model_id)
    }
}

/// 场景查询与搭建接口（同步）
pub trait Simulator: Send + Sync {
    /// 创建物体；模型不在资产目录中时返回 MissingResource
    fn spawn_actor(&self, spec: ActorSpec) -> Result<ActorId, SimError>;

    /// 清空场景并让机械臂回到初始位姿
    fn reset(&self);

    fn actor_pose(&self, actor: ActorId) -> Result<Pose, SimError>;

    fn functional_point(&self, actor: ActorId, id: usize) -> Result<Pose, SimError>;

    fn contact_point(&self, actor: ActorId, id: usize) -> Result<Pose, SimError>;

    /// 地面投影的半尺寸 (x, y)
    fn footprint(&self, actor: ActorId) -> Result<Vector2<f64>, SimError>;

    /// 铰接物体的关节位置（如微波炉门的转角）
    fn joint_position(&self, actor: ActorId) -> Result<f64, SimError>;

    /// 关节上限
    fn joint_limit(&self, actor: ActorId) -> Result<f64, SimError>;

    /// 在接触点前方 `pre_dis` 处的末端抓取位姿
    fn grasp_pose(
        &self,
        actor: ActorId,
        arm: ArmTag,
        contact_point_id: usize,
        pre_dis: f64,
    ) -> Result<Pose, SimError>;

    fn end_effector_pose(&self, arm: ArmTag) -> Pose;

    /// 机械臂的待机位姿
    fn rest_pose(&self, arm: ArmTag) -> Pose;

    /// 夹爪开度：0 闭合，1 全开
    fn gripper_aperture(&self, arm: ArmTag) -> f64;

    /// 夹爪与该物体的接触位置（世界系）
    fn gripper_contacts(&self, actor: ActorId) -> Result<Vec<Vector3<f64>>, SimError>;
}

/// 动作执行接口：每只臂的动作序列由调度器逐个下发
#[async_trait]
pub trait MotionExecutor: Send + Sync {
    /// 执行单个原子动作；返回 false 表示规划器无法到达目标
    async fn execute_action(&self, action: &Action) -> bool;
}

/// 同时提供查询与执行的完整后端
pub trait SimBackend: Simulator + MotionExecutor {
    fn as_simulator(&self) -> &dyn Simulator;
    fn as_executor(&self) -> &dyn MotionExecutor;
}

impl<T: Simulator + MotionExecutor> SimBackend for T {
    fn as_simulator(&self) -> &dyn Simulator {
        self
    }

    fn as_executor(&self) -> &dyn MotionExecutor {
        self
    }
}
