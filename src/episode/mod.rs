//! Episode 层：单个 episode 的状态、阶段抽象、任务目录与运行器

pub mod context;
pub mod runner;
pub mod stage;
pub mod tasks;

pub use context::EpisodeContext;
pub use runner::EpisodeRunner;
pub use stage::{SceneSetup, Session, Stage};
pub use tasks::TaskKind;
