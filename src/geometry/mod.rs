//! 几何基础：位姿（位置 + 单位四元数）与机械臂标签
//!
//! 外部接口习惯用 7 元向量 `[x, y, z, qw, qx, qy, qz]` 表示位姿，这里统一转换为 nalgebra 类型。

pub mod arm;
pub mod pose;

pub use arm::ArmTag;
pub use pose::{PlaceTarget, Pose};
