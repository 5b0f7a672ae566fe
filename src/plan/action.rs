//! 原子动作与动作计划
//!
//! Action 的载荷按动词区分：move 携带目标位姿，open / close 携带夹爪开度。
//! ArmPlan 是单臂的有序动作序列；ActionPlan 是一次调度提交的一到两只臂的计划。

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::core::EpisodeError;
use crate::geometry::{ArmTag, Pose};

/// 动词判别值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Move,
    Open,
    Close,
}

/// 带判别值的动作载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "lowercase")]
pub enum ActionCommand {
    Move { target: Pose },
    Open { aperture: f64 },
    Close { aperture: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub arm: ArmTag,
    #[serde(flatten)]
    pub command: ActionCommand,
}

impl Action {
    pub fn move_to(arm: ArmTag, target: Pose) -> Self {
        Self {
            arm,
            command: ActionCommand::Move { target },
        }
    }

    pub fn open(arm: ArmTag, aperture: f64) -> Self {
        Self {
            arm,
            command: ActionCommand::Open { aperture },
        }
    }

    pub fn close(arm: ArmTag, aperture: f64) -> Self {
        Self {
            arm,
            command: ActionCommand::Close { aperture },
        }
    }

    pub fn verb(&self) -> Verb {
        match self.command {
            ActionCommand::Move { .. } => Verb::Move,
            ActionCommand::Open { .. } => Verb::Open,
            ActionCommand::Close { .. } => Verb::Close,
        }
    }

    pub fn target(&self) -> Option<&Pose> {
        match &self.command {
            ActionCommand::Move { target } => Some(target),
            _ => None,
        }
    }

    pub fn target_mut(&mut self) -> Option<&mut Pose> {
        match &mut self.command {
            ActionCommand::Move { target } => Some(target),
            _ => None,
        }
    }
}

/// 单臂动作序列，严格按顺序执行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmPlan {
    pub arm: ArmTag,
    pub actions: Vec<Action>,
}

impl ArmPlan {
    /// 由原始动作构造；动作的 arm 字段统一改写为 `arm`
    pub fn new(arm: ArmTag, actions: Vec<Action>) -> Self {
        let actions = actions
            .into_iter()
            .map(|mut a| {
                a.arm = arm;
                a
            })
            .collect();
        Self { arm, actions }
    }

    pub fn empty(arm: ArmTag) -> Self {
        Self {
            arm,
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, mut action: Action) {
        action.arm = self.arm;
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// 平移全部 move 目标（如交接瓶子时抓高 / 抓低几厘米）
    pub fn shift_moves(mut self, delta: Vector3<f64>) -> Self {
        for action in &mut self.actions {
            if let Some(target) = action.target_mut() {
                target.position += delta;
            }
        }
        self
    }

    /// 最后一个夹爪指令，决定计划结束时夹爪的开合
    pub fn terminal_gripper(&self) -> Option<Verb> {
        self.actions
            .iter()
            .rev()
            .map(Action::verb)
            .find(|v| *v != Verb::Move)
    }
}

/// 一次调度提交：一到两只不同机械臂的计划，并发执行
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPlan {
    plans: Vec<ArmPlan>,
}

impl ActionPlan {
    pub fn single(plan: ArmPlan) -> Self {
        Self { plans: vec![plan] }
    }

    /// 两只臂并发；同一只臂出现两次视为非法
    pub fn pair(first: ArmPlan, second: ArmPlan) -> Result<Self, EpisodeError> {
        if first.arm == second.arm {
            return Err(EpisodeError::InvalidStep(format!(
                "two plans for the {} arm in one step",
                first.arm
            )));
        }
        Ok(Self {
            plans: vec![first, second],
        })
    }

    pub fn plans(&self) -> &[ArmPlan] {
        &self.plans
    }

    pub fn arms(&self) -> Vec<ArmTag> {
        self.plans.iter().map(|p| p.arm).collect()
    }

    pub fn get(&self, arm: ArmTag) -> Option<&ArmPlan> {
        self.plans.iter().find(|p| p.arm == arm)
    }

    pub fn total_actions(&self) -> usize {
        self.plans.iter().map(ArmPlan::len).sum()
    }
}

impl From<ArmPlan> for ActionPlan {
    fn from(plan: ArmPlan) -> Self {
        Self::single(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan(arm: ArmTag) -> ArmPlan {
        ArmPlan::new(
            arm,
            vec![
                Action::move_to(arm, Pose::from_position(Vector3::new(0.1, 0.0, 0.9))),
                Action::move_to(arm, Pose::from_position(Vector3::new(0.1, 0.0, 0.8))),
                Action::close(arm, 0.0),
            ],
        )
    }

    #[test]
    fn test_new_rewrites_arm_of_actions() {
        let plan = ArmPlan::new(ArmTag::Left, vec![Action::open(ArmTag::Right, 1.0)]);
        assert_eq!(plan.actions[0].arm, ArmTag::Left);
    }

    #[test]
    fn test_shift_moves_only_touches_targets() {
        let plan = sample_plan(ArmTag::Right).shift_moves(Vector3::new(0.0, 0.0, 0.06));
        assert!((plan.actions[0].target().unwrap().position.z - 0.96).abs() < 1e-9);
        assert!((plan.actions[1].target().unwrap().position.z - 0.86).abs() < 1e-9);
        assert_eq!(plan.actions[2].verb(), Verb::Close);
    }

    #[test]
    fn test_terminal_gripper() {
        let mut plan = sample_plan(ArmTag::Left);
        assert_eq!(plan.terminal_gripper(), Some(Verb::Close));
        plan.push(Action::open(ArmTag::Left, 1.0));
        plan.push(Action::move_to(ArmTag::Left, Pose::default()));
        assert_eq!(plan.terminal_gripper(), Some(Verb::Open));
    }

    #[test]
    fn test_pair_rejects_same_arm() {
        let err = ActionPlan::pair(sample_plan(ArmTag::Left), sample_plan(ArmTag::Left));
        assert!(matches!(err, Err(EpisodeError::InvalidStep(_))));

        let ok = ActionPlan::pair(sample_plan(ArmTag::Left), sample_plan(ArmTag::Right)).unwrap();
        assert_eq!(ok.arms(), vec![ArmTag::Left, ArmTag::Right]);
        assert_eq!(ok.total_actions(), 6);
    }

    #[test]
    fn test_action_serializes_with_verb_tag() {
        let json = serde_json::to_value(Action::close(ArmTag::Left, 0.0)).unwrap();
        assert_eq!(json["verb"], "close");
        assert_eq!(json["arm"], "left");
    }
}
