//! Episode 运行器
//!
//! 一个 episode：重置仿真 → 重建上下文 → 各阶段依次 setup → 各阶段依次 play（每个阶段结束后检查它登记的判据）
//! → 汇总结果。批量运行时按种子递增逐个执行，每个 episode 输出一条记录；错误交给 RecoveryPolicy 决定跳过还是终止。

use std::ops::Range;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core::{BatchReport, EpisodeError, EpisodeOutcome, EpisodeRecord, RecoveryAction, RecoveryPolicy};
use crate::episode::{EpisodeContext, SceneSetup, Session, Stage, TaskKind};
use crate::sim::{SimBackend, Simulator};

pub struct EpisodeRunner {
    backend: Arc<dyn SimBackend>,
    config: AppConfig,
    task: TaskKind,
    recovery: RecoveryPolicy,
    cancel: CancellationToken,
    ctx: EpisodeContext,
    stages: Vec<Box<dyn Stage>>,
    /// 每个阶段登记的判据下标
    checks: Vec<Range<usize>>,
    ready: bool,
}

impl EpisodeRunner {
    /// 任务取自配置中的 `episode.task`
    pub fn new(backend: Arc<dyn SimBackend>, config: AppConfig) -> Result<Self, EpisodeError> {
        let task = config.episode.task.parse()?;
        Ok(Self {
            backend,
            config,
            task,
            recovery: RecoveryPolicy::new(),
            cancel: CancellationToken::new(),
            ctx: EpisodeContext::new(0),
            stages: Vec::new(),
            checks: Vec::new(),
            ready: false,
        })
    }

    pub fn with_task(mut self, task: TaskKind) -> Self {
        self.task = task;
        self.ready = false;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn context(&self) -> &EpisodeContext {
        &self.ctx
    }

    pub fn simulator(&self) -> &dyn Simulator {
        self.backend.as_simulator()
    }

    /// 搭建新 episode 的场景；之前的所有 episode 状态都被丢弃
    pub fn setup_scene(&mut self, seed: u64) -> Result<(), EpisodeError> {
        self.ready = false;
        let sim = self.backend.as_simulator();
        sim.reset();
        self.ctx.reset(seed);
        self.stages = self.task.build_stages(&self.config)?;
        self.checks.clear();

        for stage in self.stages.iter_mut() {
            let first = self.ctx.evaluator.len();
            stage.setup(&mut SceneSetup::new(&mut self.ctx, sim, &self.config))?;
            self.checks.push(first..self.ctx.evaluator.len());
            tracing::debug!(stage = stage.name(), "stage set up");
        }

        tracing::info!(
            task = %self.task,
            seed,
            zones = self.ctx.registry.len(),
            sampling_exhausted = self.ctx.sampling_exhausted,
            "scene ready"
        );
        self.ready = true;
        Ok(())
    }

    /// 执行已搭建好的 episode；每个场景只能执行一次
    pub async fn run_episode(&mut self) -> Result<EpisodeOutcome, EpisodeError> {
        if !self.ready {
            return Err(EpisodeError::InvalidStep("run_episode called before setup_scene".into()));
        }
        self.ready = false;

        let backend: &dyn SimBackend = &*self.backend;
        for (stage, checks) in self.stages.iter_mut().zip(self.checks.iter()) {
            if self.cancel.is_cancelled() {
                return Err(EpisodeError::Cancelled);
            }
            tracing::info!(stage = stage.name(), "stage start");
            stage
                .play(&mut Session::new(&mut self.ctx, backend, &self.config))
                .await?;
            for index in checks.clone() {
                self.ctx
                    .evaluator
                    .check_stage(index, backend.as_simulator(), None)?;
            }
            tracing::info!(
                stage = stage.name(),
                plan_success = self.ctx.plan_success,
                "stage done"
            );
        }

        let success = self.check_success(None)?;
        Ok(EpisodeOutcome {
            plan_success: self.ctx.plan_success,
            success,
            injected: self.ctx.injected,
            sampling_exhausted: self.ctx.sampling_exhausted,
            info: self.ctx.info.clone(),
        })
    }

    /// 按阶段顺序求与；`threshold` 覆盖铰接判据的比例阈值
    pub fn check_success(&mut self, threshold: Option<f64>) -> Result<bool, EpisodeError> {
        let sim = self.backend.as_simulator();
        Ok(self.ctx.evaluator.evaluate(sim, threshold)?)
    }

    /// 连续运行 `count` 个 episode，种子从配置中的 `episode.seed`（缺省时随机）开始递增
    ///
    /// 致命错误终止批量时，之前完成的记录仍随报告返回。
    pub async fn run_batch(&mut self, count: usize) -> BatchReport {
        let first_seed = self.config.episode.seed.unwrap_or_else(rand::random);
        let mut records = Vec::with_capacity(count);

        for i in 0..count {
            if self.cancel.is_cancelled() {
                tracing::info!(completed = records.len(), "batch cancelled");
                break;
            }
            let seed = first_seed.wrapping_add(i as u64);
            let episode_id = Uuid::new_v4().to_string();
            let started_at = chrono::Utc::now().timestamp();

            let result = match self.setup_scene(seed) {
                Ok(()) => self.run_episode().await,
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => {
                    tracing::info!(
                        episode_id = %episode_id,
                        seed,
                        success = outcome.success,
                        plan_success = outcome.plan_success,
                        "episode finished"
                    );
                    records.push(EpisodeRecord {
                        episode_id,
                        task: self.task.to_string(),
                        seed,
                        started_at,
                        outcome,
                    });
                }
                Err(EpisodeError::Cancelled) => {
                    tracing::info!(completed = records.len(), seed, "batch cancelled mid-episode");
                    break;
                }
                Err(err) => match self.recovery.handle(&err) {
                    RecoveryAction::SkipEpisode => {
                        tracing::warn!(seed, error = %err, "episode skipped");
                    }
                    RecoveryAction::Abort => {
                        tracing::error!(seed, completed = records.len(), error = %err, "aborting batch");
                        return BatchReport {
                            records,
                            aborted: Some(err),
                        };
                    }
                },
            }
        }

        BatchReport {
            records,
            aborted: None,
        }
    }
}
