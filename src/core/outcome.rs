//! Episode 结果与信息记录
//!
//! InfoRecord 是扁平的字符串映射（如 `{A}` → `114_bottle/base1`，`{a}` → `left`），
//! 由外部的自然语言指令生成器消费；EpisodeRecord 是批量运行时逐行输出的 JSON。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::EpisodeError;

/// 占位符 → 可读字符串，不允许嵌套
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoRecord(BTreeMap<String, String>);

impl InfoRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// 单个 episode 的结果
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeOutcome {
    /// 所有已编译计划是否都到达了目标
    pub plan_success: bool,
    /// 成功判定的锁存值
    pub success: bool,
    /// 失败注入分支；None 表示该任务不使用注入
    pub injected: Option<bool>,
    /// 达到采样次数上限后被“尽力接受”的放置数
    pub sampling_exhausted: usize,
    pub info: InfoRecord,
}

/// 批量运行时每个 episode 输出一行
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeRecord {
    pub episode_id: String,
    pub task: String,
    pub seed: u64,
    pub started_at: i64,
    #[serde(flatten)]
    pub outcome: EpisodeOutcome,
}

/// 批量运行的结果：终止前已完成的记录总会保留
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<EpisodeRecord>,
    /// 导致批量提前终止的错误
    pub aborted: Option<EpisodeError>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.success).count()
    }
}
