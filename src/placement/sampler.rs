//! 位姿采样器
//!
//! 每个轴在给定区间内独立均匀采样，可选地在基准姿态上叠加一个均匀的欧拉角扰动。
//! 采样器本身不检查任何约束，由调用方放在拒绝采样循环里反复调用。

use nalgebra::{UnitQuaternion, Vector3};
use rand::Rng;

use crate::geometry::Pose;

/// 桌面高度，未指定 z 时使用
pub const TABLE_HEIGHT: f64 = 0.741;

#[derive(Debug, Clone, PartialEq)]
pub struct PoseSampler {
    pub xlim: [f64; 2],
    pub ylim: [f64; 2],
    /// 上下界相同即为固定高度
    pub zlim: [f64; 2],
    /// 基准姿态
    pub base: UnitQuaternion<f64>,
    /// 绕 (x, y, z) 轴的最大扰动角；None 时不扰动
    pub rotate_lim: Option<Vector3<f64>>,
    /// y 向远端偏置：y = lo + (hi - lo) * sqrt(u)
    pub ylim_prop: bool,
}

impl PoseSampler {
    pub fn new(xlim: [f64; 2], ylim: [f64; 2]) -> Self {
        Self {
            xlim,
            ylim,
            zlim: [TABLE_HEIGHT, TABLE_HEIGHT],
            base: UnitQuaternion::identity(),
            rotate_lim: None,
            ylim_prop: false,
        }
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.zlim = [z, z];
        self
    }

    /// 基准姿态 `[qw, qx, qy, qz]`
    pub fn with_base(mut self, wxyz: [f64; 4]) -> Self {
        self.base = Pose::quat(wxyz);
        self
    }

    pub fn with_rotation(mut self, lim: [f64; 3]) -> Self {
        self.rotate_lim = Some(Vector3::from(lim));
        self
    }

    pub fn with_ylim_prop(mut self) -> Self {
        self.ylim_prop = true;
        self
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Pose {
        let x = uniform(rng, self.xlim);
        let y = if self.ylim_prop {
            let (lo, hi) = ordered(self.ylim);
            lo + (hi - lo) * rng.gen::<f64>().sqrt()
        } else {
            uniform(rng, self.ylim)
        };
        let z = uniform(rng, self.zlim);

        let rotation = match self.rotate_lim {
            Some(lim) => {
                let roll = uniform(rng, [-lim.x, lim.x]);
                let pitch = uniform(rng, [-lim.y, lim.y]);
                let yaw = uniform(rng, [-lim.z, lim.z]);
                self.base * UnitQuaternion::from_euler_angles(roll, pitch, yaw)
            }
            None => self.base,
        };

        Pose::new(Vector3::new(x, y, z), rotation)
    }
}

fn ordered(lim: [f64; 2]) -> (f64, f64) {
    (lim[0].min(lim[1]), lim[0].max(lim[1]))
}

/// 闭区间均匀采样；区间退化为一点时直接返回该点
fn uniform<R: Rng + ?Sized>(rng: &mut R, lim: [f64; 2]) -> f64 {
    let (lo, hi) = ordered(lim);
    if hi - lo <= f64::EPSILON {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_samples_stay_within_bounds() {
        let sampler = PoseSampler::new([-0.25, 0.3], [0.03, 0.23]).with_z(0.8);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let pose = sampler.sample(&mut rng);
            assert!((-0.25..=0.3).contains(&pose.position.x));
            assert!((0.03..=0.23).contains(&pose.position.y));
            assert_eq!(pose.position.z, 0.8);
        }
    }

    #[test]
    fn test_reversed_bounds_are_accepted() {
        let sampler = PoseSampler::new([0.2, -0.2], [0.1, 0.0]);
        let mut rng = StdRng::seed_from_u64(1);
        let pose = sampler.sample(&mut rng);
        assert!(pose.position.x.abs() <= 0.2);
        assert!((0.0..=0.1).contains(&pose.position.y));
    }

    #[test]
    fn test_without_rotation_keeps_base() {
        let sampler = PoseSampler::new([0.0, 0.1], [0.0, 0.1]).with_base([0.5, 0.5, 0.5, 0.5]);
        let mut rng = StdRng::seed_from_u64(3);
        let pose = sampler.sample(&mut rng);
        assert!(pose.rotation.angle_to(&sampler.base) < 1e-12);
    }

    #[test]
    fn test_rotation_perturbation_is_bounded() {
        let sampler = PoseSampler::new([0.0, 0.1], [0.0, 0.1]).with_rotation([0.0, 0.0, 0.75]);
        let mut rng = StdRng::seed_from_u64(11);
        let mut perturbed = false;
        for _ in 0..100 {
            let pose = sampler.sample(&mut rng);
            let angle = pose.rotation.angle_to(&sampler.base);
            assert!(angle <= 0.75 + 1e-9);
            perturbed |= angle > 1e-6;
        }
        assert!(perturbed);
    }

    #[test]
    fn test_same_seed_same_pose() {
        let sampler = PoseSampler::new([-0.28, 0.28], [-0.08, 0.05]).with_ylim_prop();
        let a = sampler.sample(&mut StdRng::seed_from_u64(42));
        let b = sampler.sample(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
