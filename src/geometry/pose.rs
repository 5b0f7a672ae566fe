//! 6-DoF 位姿
//!
//! 外部给出的四元数常是 0.707 这类近似值，进入本模块时归一化一次，之后的复合运算都按单位四元数处理。

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// 位置 (x, y, z) + 姿态四元数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// 仅位置，姿态取单位四元数
    pub fn from_position(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// 由 `[qw, qx, qy, qz]` 构造姿态
    pub fn quat(wxyz: [f64; 4]) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(Quaternion::new(wxyz[0], wxyz[1], wxyz[2], wxyz[3]))
    }

    /// 由 7 元向量 `[x, y, z, qw, qx, qy, qz]` 构造
    pub fn from_array(v: [f64; 7]) -> Self {
        Self::new(
            Vector3::new(v[0], v[1], v[2]),
            Self::quat([v[3], v[4], v[5], v[6]]),
        )
    }

    pub fn to_array(&self) -> [f64; 7] {
        let q = self.rotation.quaternion();
        [
            self.position.x,
            self.position.y,
            self.position.z,
            q.w,
            q.i,
            q.j,
            q.k,
        ]
    }

    /// 地面投影 (x, y)
    pub fn xy(&self) -> Vector2<f64> {
        self.position.xy()
    }

    /// 地面平面上的欧氏距离
    pub fn planar_distance(&self, other: &Pose) -> f64 {
        (self.xy() - other.xy()).norm()
    }

    pub fn translated(&self, delta: Vector3<f64>) -> Self {
        Self::new(self.position + delta, self.rotation)
    }

    /// 局部坐标轴在世界系下的方向
    pub fn local_axis(&self, axis: Vector3<f64>) -> Vector3<f64> {
        self.rotation * axis
    }

    /// 沿局部轴后退 `dis`（预抓取 / 预放置位姿由此得到）
    pub fn retreat(&self, axis: Vector3<f64>, dis: f64) -> Self {
        self.translated(-self.local_axis(axis) * dis)
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.rotation)
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self::new(iso.translation.vector, iso.rotation)
    }

    /// 位姿复合：`self * other`（other 表达在 self 坐标系中）
    pub fn compose(&self, other: &Pose) -> Self {
        Self::from_isometry(&(self.to_isometry() * other.to_isometry()))
    }

    pub fn inverse(&self) -> Self {
        Self::from_isometry(&self.to_isometry().inverse())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::from_position(Vector3::zeros())
    }
}

impl From<[f64; 7]> for Pose {
    fn from(v: [f64; 7]) -> Self {
        Self::from_array(v)
    }
}

/// 放置目标：只给位置时保持物体当前姿态；给完整位姿时 `align` 约束会对齐姿态
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaceTarget {
    Position(Vector3<f64>),
    Pose(Pose),
}

impl PlaceTarget {
    pub fn position(&self) -> Vector3<f64> {
        match self {
            PlaceTarget::Position(p) => *p,
            PlaceTarget::Pose(pose) => pose.position,
        }
    }

    pub fn translated(&self, delta: Vector3<f64>) -> Self {
        match self {
            PlaceTarget::Position(p) => PlaceTarget::Position(p + delta),
            PlaceTarget::Pose(pose) => PlaceTarget::Pose(pose.translated(delta)),
        }
    }
}

impl From<[f64; 7]> for PlaceTarget {
    fn from(v: [f64; 7]) -> Self {
        PlaceTarget::Pose(Pose::from_array(v))
    }
}

impl From<Pose> for PlaceTarget {
    fn from(pose: Pose) -> Self {
        PlaceTarget::Pose(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_array_conversion_keeps_components() {
        let raw = [0.1, -0.2, 0.9, 0.5, 0.5, 0.5, 0.5];
        let pose = Pose::from_array(raw);
        for (a, b) in pose.to_array().iter().zip(raw.iter()) {
            assert!((a - b).abs() < EPS);
        }
    }

    #[test]
    fn test_planar_distance_ignores_height() {
        let a = Pose::from_position(Vector3::new(0.0, 0.0, 0.0));
        let b = Pose::from_position(Vector3::new(0.3, 0.4, 5.0));
        assert!((a.planar_distance(&b) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_retreat_along_rotated_axis() {
        // 绕 x 轴转 180°：局部 z 指向世界 -z，后退即向上
        let pose = Pose::new(Vector3::new(0.0, 0.0, 0.8), Pose::quat([0.0, 1.0, 0.0, 0.0]));
        let pre = pose.retreat(Vector3::z(), 0.1);
        assert!((pre.position.z - 0.9).abs() < EPS);
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let pose = Pose::new(
            Vector3::new(0.2, 0.1, 0.7),
            UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
        );
        let id = pose.compose(&pose.inverse());
        assert!(id.position.norm() < EPS);
        assert!(id.rotation.angle() < 1e-6);
    }
}
