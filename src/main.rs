//! Dualarm - 双臂机器人操作 episode 编排
//!
//! 入口：初始化日志、加载配置、在内存模拟后端上批量运行 episode，每个 episode 向标准输出写一行 JSON。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use dualarm::{
    config::{load_config, AppConfig},
    core::RunSupervisor,
    observability,
    sim::MockSimulator,
    EpisodeRunner,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    // 唯一的可选参数：额外的配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    let count = config.episode.count;

    let supervisor = Arc::new(RunSupervisor::new());
    supervisor.install_signal_handler();

    let sim = Arc::new(MockSimulator::with_default_catalog());
    let mut runner = EpisodeRunner::new(sim, config)
        .context("Failed to create episode runner")?
        .with_cancel_token(supervisor.cancel_token());

    tracing::info!(task = %runner.task(), count, "starting batch");
    let report = runner.run_batch(count).await;

    for record in &report.records {
        println!("{}", serde_json::to_string(record)?);
    }
    tracing::info!(
        episodes = report.records.len(),
        succeeded = report.succeeded(),
        "batch finished"
    );

    match report.aborted {
        Some(err) => Err(anyhow::Error::new(err).context("Batch aborted")),
        None => Ok(()),
    }
}
