//! 约束放置：随机位姿采样、禁放区登记、拒绝采样循环

pub mod registry;
pub mod rejection;
pub mod sampler;

pub use registry::{ExclusionZone, ProhibitedAreaRegistry};
pub use rejection::{
    sample_placement, KeepOut, Placement, PlacementConstraints, Violation, DEFAULT_ATTEMPT_BUDGET,
};
pub use sampler::{PoseSampler, TABLE_HEIGHT};
