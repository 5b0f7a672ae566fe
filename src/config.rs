//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DUALARM__*` 覆盖（双下划线表示嵌套，如 `DUALARM__EPISODE__TASK=adjust_bottle`）。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::control::{default_profiles, RetryProfile};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub episode: EpisodeSection,
    #[serde(default)]
    pub sampling: SamplingSection,
    #[serde(default)]
    pub injection: InjectionSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [episode] 段：任务名、批量数与随机种子
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeSection {
    /// 任务名，见 `episode::TaskKind`
    #[serde(default = "default_task")]
    pub task: String,
    #[serde(default = "default_episode_count")]
    pub count: usize,
    /// 第一个 episode 的种子，后续依次加一；未设置时随机
    pub seed: Option<u64>,
}

impl Default for EpisodeSection {
    fn default() -> Self {
        Self {
            task: default_task(),
            count: default_episode_count(),
            seed: None,
        }
    }
}

fn default_task() -> String {
    "adjust_bottle".to_string()
}

fn default_episode_count() -> usize {
    1
}

/// [sampling] 段：拒绝采样上限与双臂中线间隙
#[derive(Debug, Clone, Deserialize)]
pub struct SamplingSection {
    #[serde(default = "default_attempt_budget")]
    pub attempt_budget: usize,
    #[serde(default = "default_centerline_clearance")]
    pub centerline_clearance: f64,
}

impl Default for SamplingSection {
    fn default() -> Self {
        Self {
            attempt_budget: default_attempt_budget(),
            centerline_clearance: default_centerline_clearance(),
        }
    }
}

fn default_attempt_budget() -> usize {
    crate::placement::rejection::DEFAULT_ATTEMPT_BUDGET
}

fn default_centerline_clearance() -> f64 {
    0.05
}

/// [injection] 段：失败注入概率、默认参数与各偏移的取值区间
#[derive(Debug, Clone, Deserialize)]
pub struct InjectionSection {
    #[serde(default = "default_injection_probability")]
    pub probability: f64,
    #[serde(default = "default_pre_grasp_dis")]
    pub pre_grasp_dis: f64,
    #[serde(default = "default_lift_height")]
    pub lift_height: f64,
    /// 预抓取距离扰动后的下限
    #[serde(default = "default_pre_grasp_floor")]
    pub pre_grasp_floor: f64,
    #[serde(default = "default_pre_grasp_offset")]
    pub pre_grasp_offset: [f64; 2],
    #[serde(default = "default_lift_offset")]
    pub lift_offset: [f64; 2],
    #[serde(default = "default_xy_offset")]
    pub x_offset: [f64; 2],
    #[serde(default = "default_xy_offset")]
    pub y_offset: [f64; 2],
    #[serde(default = "default_z_offset")]
    pub z_offset: [f64; 2],
}

impl Default for InjectionSection {
    fn default() -> Self {
        Self {
            probability: default_injection_probability(),
            pre_grasp_dis: default_pre_grasp_dis(),
            lift_height: default_lift_height(),
            pre_grasp_floor: default_pre_grasp_floor(),
            pre_grasp_offset: default_pre_grasp_offset(),
            lift_offset: default_lift_offset(),
            x_offset: default_xy_offset(),
            y_offset: default_xy_offset(),
            z_offset: default_z_offset(),
        }
    }
}

fn default_injection_probability() -> f64 {
    0.4
}

fn default_pre_grasp_dis() -> f64 {
    0.1
}

fn default_lift_height() -> f64 {
    0.1
}

fn default_pre_grasp_floor() -> f64 {
    0.02
}

fn default_pre_grasp_offset() -> [f64; 2] {
    [-0.08, 0.08]
}

fn default_lift_offset() -> [f64; 2] {
    [-0.15, 0.15]
}

fn default_xy_offset() -> [f64; 2] {
    [-0.15, 0.15]
}

fn default_z_offset() -> [f64; 2] {
    [-0.2, 0.1]
}

/// [retry] 段：收敛阈值、成功阈值与按物体类别的策略表
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// 铰接物体打开比例达到该值即视为成功
    #[serde(default = "default_success_threshold")]
    pub success_threshold: f64,
    /// 配置文件中的条目与内置表合并，同名类别以配置为准
    #[serde(default)]
    pub profiles: HashMap<String, RetryProfile>,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            success_threshold: default_success_threshold(),
            profiles: HashMap::new(),
        }
    }
}

impl RetrySection {
    /// 查找某类别的策略：先配置后内置
    pub fn profile(&self, category: &str) -> Option<RetryProfile> {
        self.profiles
            .get(category)
            .cloned()
            .or_else(|| default_profiles().remove(category))
    }
}

fn default_epsilon() -> f64 {
    0.001
}

fn default_success_threshold() -> f64 {
    0.7
}

/// [scheduler] 段：夹爪张开 / 闭合的目标开度
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_gripper_open")]
    pub gripper_open: f64,
    #[serde(default = "default_gripper_closed")]
    pub gripper_closed: f64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            gripper_open: default_gripper_open(),
            gripper_closed: default_gripper_closed(),
        }
    }
}

fn default_gripper_open() -> f64 {
    1.0
}

fn default_gripper_closed() -> f64 {
    0.0
}

/// 从 config 目录加载配置，环境变量 DUALARM__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DUALARM__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DUALARM")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置（批量运行之间调用，可调整注入概率等参数）
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.sampling.attempt_budget, 100);
        assert_eq!(cfg.injection.probability, 0.4);
        assert_eq!(cfg.injection.z_offset, [-0.2, 0.1]);
        assert_eq!(cfg.retry.epsilon, 0.001);
        assert_eq!(cfg.scheduler.gripper_open, 1.0);
        assert!(cfg.retry.profile("microwave").is_some());
        assert!(cfg.retry.profile("drawer").is_none());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[episode]
task = "click_alarmclock_click_bell"
count = 3
seed = 7

[injection]
probability = 0.0

[retry.profiles.microwave.primary]
name = "short"
push_contact_point = 4
budget = 5
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.episode.task, "click_alarmclock_click_bell");
        assert_eq!(cfg.episode.count, 3);
        assert_eq!(cfg.episode.seed, Some(7));
        assert_eq!(cfg.injection.probability, 0.0);
        // 未出现的键保持默认值
        assert_eq!(cfg.injection.pre_grasp_dis, 0.1);

        let profile = cfg.retry.profile("microwave").unwrap();
        assert_eq!(profile.primary.budget, 5);
        assert!(profile.primary.approach.is_empty());
        assert!(profile.fallback.is_none());
    }
}
