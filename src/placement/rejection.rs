//! 拒绝采样放置循环
//!
//! 反复调用采样器并检查：(a) 离双臂中线足够远，(b) 与本 episode 已接受的放置保持最小地面距离，
//! (c) 不落入任何禁放区，另可附加若干圆形避让点。任一条件不满足即重采样。
//! 达到采样次数上限时接受最后一次采样（可能违反约束），并通过 `exhausted` 标记出来。

use nalgebra::Vector2;
use rand::Rng;

use crate::geometry::Pose;
use crate::placement::{PoseSampler, ProhibitedAreaRegistry};

/// 默认采样次数上限
pub const DEFAULT_ATTEMPT_BUDGET: usize = 100;

/// 圆形避让区（如积木堆叠的目标位置）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeepOut {
    pub center: Vector2<f64>,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementConstraints {
    /// |x| 的下限，为双臂之间留出通道
    pub centerline_clearance: f64,
    /// 与已接受放置的最小地面距离；距离恰好相等视为满足
    pub min_pairwise_distance: f64,
    pub keep_out: Vec<KeepOut>,
    /// 是否检查禁放区
    pub respect_zones: bool,
}

impl Default for PlacementConstraints {
    fn default() -> Self {
        Self {
            centerline_clearance: 0.0,
            min_pairwise_distance: 0.0,
            keep_out: Vec::new(),
            respect_zones: true,
        }
    }
}

impl PlacementConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn centerline(mut self, clearance: f64) -> Self {
        self.centerline_clearance = clearance;
        self
    }

    pub fn min_distance(mut self, dis: f64) -> Self {
        self.min_pairwise_distance = dis;
        self
    }

    pub fn keep_out(mut self, center: [f64; 2], radius: f64) -> Self {
        self.keep_out.push(KeepOut {
            center: Vector2::from(center),
            radius,
        });
        self
    }

    pub fn ignore_zones(mut self) -> Self {
        self.respect_zones = false;
        self
    }

    /// 返回第一条被违反的约束；全部满足时为 None
    pub fn violation(
        &self,
        pose: &Pose,
        accepted: &[Vector2<f64>],
        registry: &ProhibitedAreaRegistry,
    ) -> Option<Violation> {
        let xy = pose.xy();
        if xy.x.abs() < self.centerline_clearance {
            return Some(Violation::Centerline);
        }
        if accepted
            .iter()
            .any(|p| (p - xy).norm() < self.min_pairwise_distance)
        {
            return Some(Violation::TooClose);
        }
        if self
            .keep_out
            .iter()
            .any(|k| (k.center - xy).norm() < k.radius)
        {
            return Some(Violation::KeepOut);
        }
        if self.respect_zones && registry.contains(xy) {
            return Some(Violation::Prohibited);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Centerline,
    TooClose,
    KeepOut,
    Prohibited,
}

/// 拒绝采样的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub pose: Pose,
    /// 实际采样次数
    pub attempts: usize,
    /// 次数耗尽，pose 可能违反约束
    pub exhausted: bool,
}

/// 在当前登记状态下采样一个放置位姿
pub fn sample_placement<R: Rng + ?Sized>(
    rng: &mut R,
    sampler: &PoseSampler,
    constraints: &PlacementConstraints,
    accepted: &[Vector2<f64>],
    registry: &ProhibitedAreaRegistry,
    budget: usize,
) -> Placement {
    let budget = budget.max(1);
    let mut pose = sampler.sample(rng);
    let mut last_violation = None;
    for attempt in 1..=budget {
        if attempt > 1 {
            pose = sampler.sample(rng);
        }
        match constraints.violation(&pose, accepted, registry) {
            None => {
                return Placement {
                    pose,
                    attempts: attempt,
                    exhausted: false,
                }
            }
            Some(v) => last_violation = Some(v),
        }
    }

    tracing::warn!(
        budget,
        violation = ?last_violation,
        x = pose.position.x,
        y = pose.position.y,
        "placement attempt budget exhausted, accepting last sample"
    );
    Placement {
        pose,
        attempts: budget,
        exhausted: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pairwise_ok(points: &[Vector2<f64>], min: f64) -> bool {
        points.iter().enumerate().all(|(i, a)| {
            points[i + 1..].iter().all(|b| (a - b).norm() >= min)
        })
    }

    #[test]
    fn test_three_objects_pairwise_distance_or_flagged() {
        // 0.5 x 0.2 区域内放 3 个物体，两两至少 0.13
        let sampler = PoseSampler::new([-0.25, 0.25], [0.0, 0.2]);
        let constraints = PlacementConstraints::new().min_distance(0.13);
        let registry = ProhibitedAreaRegistry::new();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut accepted = Vec::new();
            let mut any_exhausted = false;
            for _ in 0..3 {
                let placement = sample_placement(
                    &mut rng,
                    &sampler,
                    &constraints,
                    &accepted,
                    &registry,
                    DEFAULT_ATTEMPT_BUDGET,
                );
                any_exhausted |= placement.exhausted;
                accepted.push(placement.pose.xy());
            }
            assert!(any_exhausted || pairwise_ok(&accepted, 0.13), "seed {seed}");
        }
    }

    #[test]
    fn test_exhaustion_returns_last_sample_and_flag() {
        // 中线间隙比整个采样区间还宽，必然耗尽
        let sampler = PoseSampler::new([-0.04, 0.04], [0.0, 0.1]);
        let constraints = PlacementConstraints::new().centerline(0.05);
        let registry = ProhibitedAreaRegistry::new();
        let mut rng = StdRng::seed_from_u64(5);

        let placement = sample_placement(&mut rng, &sampler, &constraints, &[], &registry, 100);
        assert!(placement.exhausted);
        assert_eq!(placement.attempts, 100);
        assert!(placement.pose.position.x.abs() < 0.05);
    }

    #[test]
    fn test_zones_are_checked_at_sample_time() {
        let sampler = PoseSampler::new([-0.3, 0.3], [-0.3, 0.3]);
        let constraints = PlacementConstraints::new();
        let mut registry = ProhibitedAreaRegistry::new();
        registry.register_bounds([-0.3, -0.3, 0.3, 0.0]);
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..20 {
            let placement =
                sample_placement(&mut rng, &sampler, &constraints, &[], &registry, 100);
            assert!(!placement.exhausted);
            assert!(placement.pose.position.y > 0.0);
        }
    }

    #[test]
    fn test_ignore_zones() {
        let mut registry = ProhibitedAreaRegistry::new();
        registry.register_bounds([-1.0, -1.0, 1.0, 1.0]);
        let pose = Pose::default();
        assert_eq!(
            PlacementConstraints::new().violation(&pose, &[], &registry),
            Some(Violation::Prohibited)
        );
        assert_eq!(
            PlacementConstraints::new()
                .ignore_zones()
                .violation(&pose, &[], &registry),
            None
        );
    }

    #[test]
    fn test_equal_distance_is_accepted() {
        let registry = ProhibitedAreaRegistry::new();
        let constraints = PlacementConstraints::new().min_distance(0.1);
        let pose = Pose::from_position(nalgebra::Vector3::new(0.1, 0.0, 0.0));
        assert_eq!(constraints.violation(&pose, &[Vector2::new(0.0, 0.0)], &registry), None);
    }

    #[test]
    fn test_keep_out_circle() {
        let registry = ProhibitedAreaRegistry::new();
        let constraints = PlacementConstraints::new().keep_out([0.0, -0.1], 0.15);
        let inside = Pose::from_position(nalgebra::Vector3::new(0.1, -0.1, 0.0));
        let outside = Pose::from_position(nalgebra::Vector3::new(0.2, -0.1, 0.0));
        assert_eq!(constraints.violation(&inside, &[], &registry), Some(Violation::KeepOut));
        assert_eq!(constraints.violation(&outside, &[], &registry), None);
    }
}
