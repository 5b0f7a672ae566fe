//! 动作计划编译器：把语义动词（grasp / place / move / 开合夹爪 / 回原位）编译为单臂有序动作序列
//!
//! 编译时读取仿真端的当前状态（末端位姿、接触点、功能点），因此必须在上一步调度返回之后再编译下一步。
//! 同一次调用里为两只臂编译的计划交给调度器并发执行。

use nalgebra::Vector3;

use crate::core::SimError;
use crate::geometry::{ArmTag, PlaceTarget, Pose};
use crate::plan::{Action, ArmPlan};
use crate::sim::{ActorId, Simulator};

/// 两段距离相同时只生成一个接近位姿
const SAME_DISTANCE_EPS: f64 = 1e-9;

/// 抓取参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraspSpec {
    /// 预抓取位姿离接触点的距离
    pub pre_grasp_dis: f64,
    /// 抓取位姿离接触点的距离
    pub grasp_dis: f64,
    pub contact_point_id: usize,
}

impl Default for GraspSpec {
    fn default() -> Self {
        Self {
            pre_grasp_dis: 0.1,
            grasp_dis: 0.0,
            contact_point_id: 0,
        }
    }
}

impl GraspSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_grasp(mut self, dis: f64) -> Self {
        self.pre_grasp_dis = dis;
        self
    }

    pub fn grasp(mut self, dis: f64) -> Self {
        self.grasp_dis = dis;
        self
    }

    pub fn contact_point(mut self, id: usize) -> Self {
        self.contact_point_id = id;
        self
    }

    /// 预抓取与抓取距离都为 0：贴着接触点“按压”，用于推门、按按钮
    pub fn press(contact_point_id: usize) -> Self {
        Self {
            pre_grasp_dis: 0.0,
            grasp_dis: 0.0,
            contact_point_id,
        }
    }
}

/// 放置时的姿态约束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Constrain {
    /// 保持物体当前的相对姿态，只平移
    #[default]
    Free,
    /// 对齐目标位姿的姿态
    Align,
}

/// 预放置偏移所沿的轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreDisAxis {
    /// 末端的接近方向（局部 z）
    #[default]
    Grasp,
    /// 功能点的局部 z
    FunctionalPoint,
}

/// 放置参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceSpec {
    pub functional_point_id: usize,
    pub pre_dis: f64,
    pub dis: f64,
    pub constrain: Constrain,
    pub pre_dis_axis: PreDisAxis,
    /// 放置后是否张开夹爪
    pub is_open: bool,
}

impl Default for PlaceSpec {
    fn default() -> Self {
        Self {
            functional_point_id: 0,
            pre_dis: 0.1,
            dis: 0.02,
            constrain: Constrain::Free,
            pre_dis_axis: PreDisAxis::Grasp,
            is_open: true,
        }
    }
}

impl PlaceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn functional_point(mut self, id: usize) -> Self {
        self.functional_point_id = id;
        self
    }

    pub fn distances(mut self, pre_dis: f64, dis: f64) -> Self {
        self.pre_dis = pre_dis;
        self.dis = dis;
        self
    }

    pub fn align(mut self) -> Self {
        self.constrain = Constrain::Align;
        self
    }

    pub fn axis(mut self, axis: PreDisAxis) -> Self {
        self.pre_dis_axis = axis;
        self
    }

    pub fn open(mut self, is_open: bool) -> Self {
        self.is_open = is_open;
        self
    }
}

/// 相对位移所在的坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveFrame {
    #[default]
    World,
    /// 机械臂末端自身坐标系；内置任务的抬升都在世界系下，此项供外部调用方沿接近轴退让
    Arm,
}

/// 编译器：只读访问仿真端
pub struct PlanCompiler<'a> {
    sim: &'a dyn Simulator,
    gripper_open: f64,
    gripper_closed: f64,
}

impl<'a> PlanCompiler<'a> {
    pub fn new(sim: &'a dyn Simulator) -> Self {
        Self {
            sim,
            gripper_open: 1.0,
            gripper_closed: 0.0,
        }
    }

    /// 设置夹爪张开 / 闭合的目标开度
    pub fn with_apertures(mut self, open: f64, closed: f64) -> Self {
        self.gripper_open = open;
        self.gripper_closed = closed;
        self
    }

    /// 直接查询抓取位姿（自定义按压动作时使用）
    pub fn get_grasp_pose(
        &self,
        actor: ActorId,
        arm: ArmTag,
        contact_point_id: usize,
        pre_dis: f64,
    ) -> Result<Pose, SimError> {
        self.sim.grasp_pose(actor, arm, contact_point_id, pre_dis)
    }

    /// [预抓取, 抓取, 闭合]；两段距离相同时省略中间的抓取位姿
    pub fn grasp_actor(
        &self,
        actor: ActorId,
        arm: ArmTag,
        spec: GraspSpec,
    ) -> Result<ArmPlan, SimError> {
        let pre = self
            .sim
            .grasp_pose(actor, arm, spec.contact_point_id, spec.pre_grasp_dis)?;
        let mut plan = ArmPlan::empty(arm);
        plan.push(Action::move_to(arm, pre));
        if (spec.pre_grasp_dis - spec.grasp_dis).abs() > SAME_DISTANCE_EPS {
            let grasp = self
                .sim
                .grasp_pose(actor, arm, spec.contact_point_id, spec.grasp_dis)?;
            plan.push(Action::move_to(arm, grasp));
        }
        plan.push(Action::close(arm, self.gripper_closed));
        Ok(plan)
    }

    /// [预放置, 放置, 可选张开]
    ///
    /// 末端相对功能点的变换在编译时取当前值并保持不变：功能点被送到目标处，末端随之确定。
    /// `Align` 且目标带姿态时功能点姿态取目标姿态，否则保持功能点当前姿态。
    pub fn place_actor(
        &self,
        actor: ActorId,
        target: PlaceTarget,
        arm: ArmTag,
        spec: PlaceSpec,
    ) -> Result<ArmPlan, SimError> {
        let ee = self.sim.end_effector_pose(arm);
        let fp = self.sim.functional_point(actor, spec.functional_point_id)?;
        let ee_in_fp = fp.inverse().compose(&ee);

        let fp_target = match (spec.constrain, target) {
            (Constrain::Align, PlaceTarget::Pose(pose)) => pose,
            _ => Pose::new(target.position(), fp.rotation),
        };
        let ee_target = fp_target.compose(&ee_in_fp);

        let axis = match spec.pre_dis_axis {
            PreDisAxis::Grasp => ee_target.local_axis(Vector3::z()),
            PreDisAxis::FunctionalPoint => fp_target.local_axis(Vector3::z()),
        };
        let pre_place = ee_target.translated(-axis * spec.pre_dis);
        let place = ee_target.translated(-axis * spec.dis);

        let mut plan = ArmPlan::empty(arm);
        plan.push(Action::move_to(arm, pre_place));
        plan.push(Action::move_to(arm, place));
        if spec.is_open {
            plan.push(Action::open(arm, self.gripper_open));
        }
        Ok(plan)
    }

    /// 相对当前末端位姿的一次平移
    pub fn move_by_displacement(
        &self,
        arm: ArmTag,
        displacement: Vector3<f64>,
        frame: MoveFrame,
    ) -> ArmPlan {
        let current = self.sim.end_effector_pose(arm);
        let delta = match frame {
            MoveFrame::World => displacement,
            MoveFrame::Arm => current.rotation * displacement,
        };
        ArmPlan::new(arm, vec![Action::move_to(arm, current.translated(delta))])
    }

    pub fn open_gripper(&self, arm: ArmTag) -> ArmPlan {
        ArmPlan::new(arm, vec![Action::open(arm, self.gripper_open)])
    }

    pub fn close_gripper(&self, arm: ArmTag) -> ArmPlan {
        self.close_gripper_to(arm, self.gripper_closed)
    }

    pub fn close_gripper_to(&self, arm: ArmTag, aperture: f64) -> ArmPlan {
        ArmPlan::new(arm, vec![Action::close(arm, aperture)])
    }

    /// 回到待机位姿，给另一只臂让出空间
    pub fn back_to_origin(&self, arm: ArmTag) -> ArmPlan {
        ArmPlan::new(arm, vec![Action::move_to(arm, self.sim.rest_pose(arm))])
    }
}
