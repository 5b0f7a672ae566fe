//! 任务目录
//!
//! 任务集合是封闭的，按配置中的名字选择；组合任务由若干阶段顺序拼接。

mod adjust_bottle;
mod bottles_dustbin;
mod click;
mod open_microwave;
mod stack_blocks;

use std::fmt;
use std::str::FromStr;

pub use adjust_bottle::AdjustBottle;
pub use bottles_dustbin::PutBottlesDustbin;
pub use click::{ClickAlarmClock, ClickBell};
pub use open_microwave::OpenMicrowave;
pub use stack_blocks::StackBlocksThree;

use crate::config::AppConfig;
use crate::core::EpisodeError;
use crate::episode::Stage;
use crate::injection::FailureInjectionPolicy;
use crate::sim::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    AdjustBottle,
    ClickAlarmclockClickBell,
    PutBottlesDustbinStackBlocksThree,
    PutBottlesDustbinStackBlocksThreeOpenMicrowave,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::AdjustBottle,
        TaskKind::ClickAlarmclockClickBell,
        TaskKind::PutBottlesDustbinStackBlocksThree,
        TaskKind::PutBottlesDustbinStackBlocksThreeOpenMicrowave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::AdjustBottle => "adjust_bottle",
            TaskKind::ClickAlarmclockClickBell => "click_alarmclock_click_bell",
            TaskKind::PutBottlesDustbinStackBlocksThree => "put_bottles_dustbin_stack_blocks_three",
            TaskKind::PutBottlesDustbinStackBlocksThreeOpenMicrowave => {
                "put_bottles_dustbin_stack_blocks_three_open_microwave"
            }
        }
    }

    /// 为一个新 episode 构造全新的阶段列表
    pub fn build_stages(self, config: &AppConfig) -> Result<Vec<Box<dyn Stage>>, EpisodeError> {
        let stages: Vec<Box<dyn Stage>> = match self {
            TaskKind::AdjustBottle => vec![Box::new(AdjustBottle::new(FailureInjectionPolicy::new(
                config.injection.clone(),
            )))],
            TaskKind::ClickAlarmclockClickBell => {
                vec![Box::new(ClickAlarmClock::new()), Box::new(ClickBell::new())]
            }
            TaskKind::PutBottlesDustbinStackBlocksThree => vec![
                Box::new(PutBottlesDustbin::new()),
                Box::new(StackBlocksThree::new()),
            ],
            TaskKind::PutBottlesDustbinStackBlocksThreeOpenMicrowave => {
                let profile = config.retry.profile("microwave").ok_or_else(|| {
                    EpisodeError::Config("no retry profile for category 'microwave'".into())
                })?;
                vec![
                    Box::new(PutBottlesDustbin::new()),
                    Box::new(StackBlocksThree::new()),
                    Box::new(OpenMicrowave::new(profile, config.retry.epsilon)),
                ]
            }
        };
        Ok(stages)
    }
}

/// 阶段在 setup 中创建的物体；play 先于 setup 调用时报错
fn spawned(actor: Option<ActorId>, stage: &str) -> Result<ActorId, EpisodeError> {
    actor.ok_or_else(|| EpisodeError::InvalidStep(format!("stage '{stage}' played before setup")))
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = EpisodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| EpisodeError::UnknownTask(s.to_string()))
    }
}
