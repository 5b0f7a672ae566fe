//! 失败注入策略
//!
//! 以固定概率在编译计划之前扰动操作参数：预抓取距离（带下限）、抬升高度、放置目标的三维位置偏移，姿态不动。
//! 注入生效时放置后不松爪，计划结束时夹爪保持闭合；决策结果写入 episode，成功判定与标签据此保持一致。

use nalgebra::Vector3;
use rand::Rng;
use serde::Serialize;

use crate::config::InjectionSection;
use crate::geometry::PlaceTarget;

/// 一次抓取-抬升-放置所用的参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ManipulationParams {
    pub pre_grasp_dis: f64,
    pub lift_height: f64,
    /// 放置目标的位置偏移（世界系）
    pub target_offset: Vector3<f64>,
    /// 放置后是否张开夹爪
    pub release: bool,
}

impl ManipulationParams {
    pub fn nominal(pre_grasp_dis: f64, lift_height: f64) -> Self {
        Self {
            pre_grasp_dis,
            lift_height,
            target_offset: Vector3::zeros(),
            release: true,
        }
    }

    /// 只平移目标位置，保留姿态
    pub fn apply_to(&self, target: PlaceTarget) -> PlaceTarget {
        target.translated(self.target_offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InjectionDecision {
    pub active: bool,
    pub params: ManipulationParams,
}

#[derive(Debug, Clone)]
pub struct FailureInjectionPolicy {
    cfg: InjectionSection,
}

impl FailureInjectionPolicy {
    pub fn new(cfg: InjectionSection) -> Self {
        Self { cfg }
    }

    /// 永不注入
    pub fn disabled() -> Self {
        Self::new(InjectionSection {
            probability: 0.0,
            ..InjectionSection::default()
        })
    }

    pub fn probability(&self) -> f64 {
        self.cfg.probability
    }

    /// 每个 episode 抽一次
    pub fn decide<R: Rng + ?Sized>(&self, rng: &mut R) -> InjectionDecision {
        let nominal = ManipulationParams::nominal(self.cfg.pre_grasp_dis, self.cfg.lift_height);
        if rng.gen::<f64>() >= self.cfg.probability {
            return InjectionDecision {
                active: false,
                params: nominal,
            };
        }

        let pre_grasp_dis = (nominal.pre_grasp_dis + draw(rng, self.cfg.pre_grasp_offset))
            .max(self.cfg.pre_grasp_floor);
        let lift_height = nominal.lift_height + draw(rng, self.cfg.lift_offset);
        let target_offset = Vector3::new(
            draw(rng, self.cfg.x_offset),
            draw(rng, self.cfg.y_offset),
            draw(rng, self.cfg.z_offset),
        );
        tracing::info!(
            pre_grasp_dis,
            lift_height,
            dx = target_offset.x,
            dy = target_offset.y,
            dz = target_offset.z,
            "failure injection active"
        );

        InjectionDecision {
            active: true,
            params: ManipulationParams {
                pre_grasp_dis,
                lift_height,
                target_offset,
                release: false,
            },
        }
    }
}

impl Default for FailureInjectionPolicy {
    fn default() -> Self {
        Self::new(InjectionSection::default())
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, range: [f64; 2]) -> f64 {
    let (lo, hi) = if range[0] <= range[1] {
        (range[0], range[1])
    } else {
        (range[1], range[0])
    };
    if hi - lo <= f64::EPSILON {
        lo
    } else {
        rng.gen_range(lo..hi)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::geometry::Pose;

    #[test]
    fn test_inactive_params_are_exact_defaults() {
        let policy = FailureInjectionPolicy::disabled();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let decision = policy.decide(&mut rng);
            assert!(!decision.active);
            assert_eq!(decision.params, ManipulationParams::nominal(0.1, 0.1));
        }
    }

    #[test]
    fn test_always_active_respects_ranges() {
        let policy = FailureInjectionPolicy::new(InjectionSection {
            probability: 1.0,
            ..InjectionSection::default()
        });
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let decision = policy.decide(&mut rng);
            let p = decision.params;
            assert!(decision.active);
            assert!(!p.release);
            assert!(p.pre_grasp_dis >= 0.02 && p.pre_grasp_dis <= 0.18);
            assert!(p.lift_height >= -0.05 && p.lift_height <= 0.25);
            assert!(p.target_offset.x.abs() <= 0.15);
            assert!(p.target_offset.y.abs() <= 0.15);
            assert!(p.target_offset.z >= -0.2 && p.target_offset.z <= 0.1);
        }
    }

    #[test]
    fn test_mixed_probability_yields_both_branches() {
        let policy = FailureInjectionPolicy::default();
        let mut rng = StdRng::seed_from_u64(3);
        let active = (0..500).filter(|_| policy.decide(&mut rng).active).count();
        assert!(active > 100 && active < 300, "active = {active}");
    }

    #[test]
    fn test_apply_keeps_orientation() {
        let params = ManipulationParams {
            target_offset: Vector3::new(0.1, -0.1, 0.05),
            ..ManipulationParams::nominal(0.1, 0.1)
        };
        let target = PlaceTarget::Pose(Pose::from_array([-0.25, -0.12, 0.95, 0.0, 1.0, 0.0, 0.0]));
        match params.apply_to(target) {
            PlaceTarget::Pose(pose) => {
                assert!((pose.position - Vector3::new(-0.15, -0.22, 1.0)).norm() < 1e-9);
                assert_eq!(pose.rotation, Pose::from_array([0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).rotation);
            }
            other => panic!("unexpected target {other:?}"),
        }
    }
}
