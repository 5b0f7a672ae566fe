//! 单个 episode 的可变状态
//!
//! 禁放区、已接受的放置、规划成功标记、上一次使用的机械臂 / 物体、成功锁存与信息记录都只属于当前 episode，
//! 在 episode 开始时整体重建，不跨 episode 共享。

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::InfoRecord;
use crate::geometry::ArmTag;
use crate::placement::ProhibitedAreaRegistry;
use crate::sim::ActorId;
use crate::success::SuccessEvaluator;

#[derive(Debug)]
pub struct EpisodeContext {
    pub seed: u64,
    /// 本 episode 全部随机数的来源
    pub rng: StdRng,
    pub registry: ProhibitedAreaRegistry,
    /// 已接受放置的地面坐标
    pub placements: Vec<Vector2<f64>>,
    /// 采样次数耗尽后被接受的放置数
    pub sampling_exhausted: usize,
    /// 所有已调度计划的与；为 false 后的调度会被跳过
    pub plan_success: bool,
    pub injected: Option<bool>,
    pub last_arm: Option<ArmTag>,
    pub last_actor: Option<ActorId>,
    pub evaluator: SuccessEvaluator,
    pub info: InfoRecord,
}

impl EpisodeContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            registry: ProhibitedAreaRegistry::new(),
            placements: Vec::new(),
            sampling_exhausted: 0,
            plan_success: true,
            injected: None,
            last_arm: None,
            last_actor: None,
            evaluator: SuccessEvaluator::new(),
            info: InfoRecord::new(),
        }
    }

    pub fn reset(&mut self, seed: u64) {
        *self = Self::new(seed);
    }
}
