//! 重试策略表
//!
//! 每个物体类别一份 [`RetryProfile`]：主策略与可选的回退策略。策略由接近步骤、推动接触点与迭代上限组成，
//! 可以在配置文件的 `[retry.profiles.<类别>]` 中覆盖。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 进入迭代前的接近步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ApproachStep {
    /// 张开夹爪，松开当前抓握
    OpenGripper,
    /// 世界坐标系下的相对位移
    Displace {
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
        #[serde(default)]
        z: f64,
    },
    /// 在某个接触点抓取
    Grasp {
        contact_point: usize,
        #[serde(default = "default_pre_grasp_dis")]
        pre_grasp_dis: f64,
        #[serde(default)]
        grasp_dis: f64,
    },
}

fn default_pre_grasp_dis() -> f64 {
    0.1
}

/// 单个策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    #[serde(default)]
    pub approach: Vec<ApproachStep>,
    /// 每次迭代在此接触点做一次贴合按压
    pub push_contact_point: usize,
    /// 迭代上限
    pub budget: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryProfile {
    pub primary: StrategySpec,
    #[serde(default)]
    pub fallback: Option<StrategySpec>,
}

impl RetryProfile {
    /// 两个策略迭代上限之和，即控制器的总迭代上限
    pub fn total_budget(&self) -> usize {
        self.primary.budget + self.fallback.as_ref().map_or(0, |f| f.budget)
    }
}

/// 内置策略表；目前只有微波炉门
pub fn default_profiles() -> HashMap<String, RetryProfile> {
    let mut profiles = HashMap::new();
    profiles.insert(
        "microwave".to_string(),
        RetryProfile {
            primary: StrategySpec {
                name: "rotate_handle".into(),
                approach: vec![ApproachStep::Grasp {
                    contact_point: 0,
                    pre_grasp_dis: 0.08,
                    grasp_dis: 0.0,
                }],
                push_contact_point: 4,
                budget: 50,
            },
            fallback: Some(StrategySpec {
                name: "push_door_edge".into(),
                approach: vec![
                    ApproachStep::OpenGripper,
                    ApproachStep::Displace {
                        x: 0.0,
                        y: -0.05,
                        z: 0.05,
                    },
                    ApproachStep::Grasp {
                        contact_point: 1,
                        pre_grasp_dis: 0.1,
                        grasp_dis: 0.0,
                    },
                    ApproachStep::Grasp {
                        contact_point: 1,
                        pre_grasp_dis: 0.02,
                        grasp_dis: 0.0,
                    },
                ],
                push_contact_point: 2,
                budget: 30,
            }),
        },
    );
    profiles
}
