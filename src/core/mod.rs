//! 核心层：错误与恢复、episode 结果记录、运行监管

pub mod error;
pub mod outcome;
pub mod recovery;
pub mod supervisor;

pub use error::{EpisodeError, RecoveryAction, SimError};
pub use outcome::{BatchReport, EpisodeOutcome, EpisodeRecord, InfoRecord};
pub use recovery::RecoveryPolicy;
pub use supervisor::RunSupervisor;
