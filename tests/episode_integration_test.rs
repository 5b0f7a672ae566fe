//! Episode 集成测试：在内存模拟后端上跑完整任务

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use dualarm::config::AppConfig;
    use dualarm::core::EpisodeError;
    use dualarm::geometry::ArmTag;
    use dualarm::sim::{MockSimulator, ModelCatalog};
    use dualarm::{EpisodeRunner, TaskKind};

    fn config_with_seed(seed: u64) -> AppConfig {
        let mut config = AppConfig::default();
        config.episode.seed = Some(seed);
        config
    }

    /// 批量正常结束时取出全部记录
    async fn complete_batch(runner: &mut EpisodeRunner, count: usize) -> Vec<dualarm::core::EpisodeRecord> {
        let report = runner.run_batch(count).await;
        assert!(report.aborted.is_none(), "batch aborted: {:?}", report.aborted);
        report.records
    }

    fn runner_for(task: TaskKind, config: AppConfig) -> (Arc<MockSimulator>, EpisodeRunner) {
        let sim = Arc::new(MockSimulator::with_default_catalog());
        let runner = EpisodeRunner::new(sim.clone(), config).unwrap().with_task(task);
        (sim, runner)
    }

    #[tokio::test]
    async fn test_adjust_bottle_batch_without_injection() {
        let mut config = config_with_seed(100);
        config.injection.probability = 0.0;
        let (_, mut runner) = runner_for(TaskKind::AdjustBottle, config);

        let records = complete_batch(&mut runner, 3).await;
        assert_eq!(records.len(), 3);
        let seeds: Vec<_> = records.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![100, 101, 102]);
        let ids: HashSet<_> = records.iter().map(|r| r.episode_id.clone()).collect();
        assert_eq!(ids.len(), 3);
        for record in &records {
            assert_eq!(record.task, "adjust_bottle");
            assert!(record.outcome.plan_success);
            assert!(record.outcome.success);
            assert_eq!(record.outcome.injected, Some(false));
            assert!(record.outcome.info.get("{A}").unwrap().starts_with("001_bottle/base"));
        }
    }

    #[tokio::test]
    async fn test_injected_episode_is_never_successful() {
        let mut config = config_with_seed(7);
        config.injection.probability = 1.0;
        let (_, mut runner) = runner_for(TaskKind::AdjustBottle, config);

        for record in complete_batch(&mut runner, 4).await {
            assert_eq!(record.outcome.injected, Some(true));
            assert!(!record.outcome.success);
        }
    }

    #[tokio::test]
    async fn test_click_task_succeeds() {
        let (_, mut runner) = runner_for(TaskKind::ClickAlarmclockClickBell, AppConfig::default());
        for seed in [1, 2, 3] {
            runner.setup_scene(seed).unwrap();
            let outcome = runner.run_episode().await.unwrap();
            assert!(outcome.plan_success, "seed {seed}");
            assert!(outcome.success, "seed {seed}");
            assert_eq!(outcome.injected, None);
            assert!(outcome.info.get("{B}").unwrap().starts_with("050_bell/base"));
        }
    }

    #[tokio::test]
    async fn test_composite_task_with_microwave() {
        let (sim, mut runner) = runner_for(
            TaskKind::PutBottlesDustbinStackBlocksThreeOpenMicrowave,
            AppConfig::default(),
        );
        runner.setup_scene(42).unwrap();
        let outcome = runner.run_episode().await.unwrap();

        assert!(outcome.plan_success);
        assert!(outcome.success);
        // 后执行的阶段覆盖同名占位符
        assert!(outcome.info.get("{A}").unwrap().starts_with("044_microwave/base"));
        assert_eq!(outcome.info.get("{a}"), Some("left"));
        assert_eq!(outcome.info.get("{D}"), Some("011_dustbin/base0"));
        assert!(outcome.info.get("{c}").is_some());
        for arm in ArmTag::BOTH {
            assert!(sim.held_by(arm).is_none());
        }
        let status = runner.context().evaluator.status();
        assert_eq!(status.len(), 3);
        assert!(status.iter().all(|s| s.latched));
    }

    #[tokio::test]
    async fn test_plan_failure_is_recorded_not_raised() {
        let (sim, mut runner) = runner_for(TaskKind::AdjustBottle, config_with_seed(5));
        sim.fail_after(ArmTag::Left, 0);
        sim.fail_after(ArmTag::Right, 0);

        let records = complete_batch(&mut runner, 1).await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].outcome.plan_success);
        assert!(!records[0].outcome.success);
        // 第一步失败后不再下发任何动作
        assert_eq!(sim.action_log().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_model_aborts_batch() {
        let mut catalog = ModelCatalog::default_catalog();
        catalog.remove("050_bell");
        let sim = Arc::new(MockSimulator::new(catalog));
        let mut runner = EpisodeRunner::new(sim, config_with_seed(0))
            .unwrap()
            .with_task(TaskKind::ClickAlarmclockClickBell);

        let report = runner.run_batch(5).await;
        assert!(report.records.is_empty());
        assert!(report.aborted.unwrap().is_missing_resource());
    }

    #[tokio::test]
    async fn test_abort_keeps_completed_records() {
        // 只保留一个铃铛型号：抽到另一个型号的 episode 终止批量
        let mut catalog = ModelCatalog::default_catalog();
        let mut bell = catalog.get("050_bell").unwrap().clone();
        bell.model_ids = vec![0];
        catalog.insert("050_bell", bell);
        let sim = Arc::new(MockSimulator::new(catalog));
        let mut runner = EpisodeRunner::new(sim, config_with_seed(0))
            .unwrap()
            .with_task(TaskKind::ClickAlarmclockClickBell);

        let report = runner.run_batch(20).await;
        let err = report.aborted.as_ref().unwrap();
        assert!(err.is_missing_resource());
        assert!(!report.records.is_empty());
        assert!(report.records.len() < 20);
        let seeds: Vec<_> = report.records.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, (0..report.records.len() as u64).collect::<Vec<_>>());
        for record in &report.records {
            assert_eq!(record.outcome.info.get("{B}"), Some("050_bell/base0"));
        }
    }

    #[tokio::test]
    async fn test_unknown_task_in_config() {
        let mut config = AppConfig::default();
        config.episode.task = "fold_towel".into();
        let sim = Arc::new(MockSimulator::with_default_catalog());
        assert!(matches!(
            EpisodeRunner::new(sim, config),
            Err(EpisodeError::UnknownTask(_))
        ));
    }

    #[tokio::test]
    async fn test_record_serializes_flat() {
        let mut config = config_with_seed(11);
        config.injection.probability = 0.0;
        let (_, mut runner) = runner_for(TaskKind::AdjustBottle, config);
        let records = complete_batch(&mut runner, 1).await;

        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["seed"], 11);
        assert_eq!(value["task"], "adjust_bottle");
        assert_eq!(value["plan_success"], true);
        assert_eq!(value["injected"], false);
        assert!(value["info"]["{a}"].is_string());
        assert!(value["episode_id"].is_string());
    }
}
