//! 场景运行模块
//!
//! 启动配置数量的虚拟用户，每个虚拟用户独立循环执行请求序列；
//! 运行窗口结束后对聚合指标求值阈值，生成最终判定。

mod vu;

pub use vu::VuState;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::watch;
use uuid::Uuid;

use crate::common::duration::format_duration;
use crate::executor::RequestExecutor;
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::model::scenario::Scenario;
use crate::threshold::{self, Verdict};
use vu::VirtualUser;

/// 一次运行的汇总结果
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub vus: u32,
    /// 所有虚拟用户完成的迭代总数
    pub iterations: u64,
    pub metrics: MetricsSnapshot,
    pub verdict: Verdict,
}

/// 场景运行器
pub struct ScenarioRunner {
    scenario: Arc<Scenario>,
    executor: Arc<dyn RequestExecutor>,
}

impl ScenarioRunner {
    pub fn new(scenario: Scenario, executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            scenario: Arc::new(scenario),
            executor,
        }
    }

    /// 运行场景直到时长或迭代上限到达
    pub async fn run(&self) -> RunSummary {
        let scenario = &self.scenario;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        tracing::info!(
            "开始运行场景 {} (run_id={}): vus={}, duration={}, iterations={}",
            scenario.name,
            run_id,
            scenario.vus,
            scenario
                .duration
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string()),
            scenario
                .iterations
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );

        let metrics = Arc::new(MetricsAggregator::new(scenario.tags()));
        let (stop_tx, stop_rx) = watch::channel(false);

        let handles: Vec<_> = (0..scenario.vus)
            .map(|id| {
                let vu = VirtualUser::new(
                    id,
                    scenario.clone(),
                    self.executor.clone(),
                    metrics.clone(),
                );
                tokio::spawn(vu.run(stop_rx.clone()))
            })
            .collect();

        let mut all = std::pin::pin!(join_all(handles));
        let results = match scenario.duration {
            Some(duration) => match tokio::time::timeout(duration, all.as_mut()).await {
                Ok(results) => results,
                Err(_) => {
                    tracing::info!("运行时长已到，等待进行中的请求完成");
                    let _ = stop_tx.send(true);
                    all.await
                }
            },
            None => all.await,
        };

        let mut iterations = 0;
        for result in results {
            match result {
                Ok(completed) => iterations += completed,
                Err(e) => tracing::error!("虚拟用户异常退出: {}", e),
            }
        }

        let elapsed = start.elapsed();
        let snapshot = metrics.snapshot();
        let verdict = threshold::evaluate(&snapshot, &scenario.thresholds);

        tracing::info!(
            "场景 {} 结束: {} 次迭代, {} 个请求, 耗时 {:.2}s, 判定: {}",
            scenario.name,
            iterations,
            snapshot.total_requests(),
            elapsed.as_secs_f64(),
            if verdict.passed { "通过" } else { "失败" }
        );

        RunSummary {
            run_id,
            scenario: scenario.name.clone(),
            started_at,
            elapsed,
            vus: scenario.vus,
            iterations,
            metrics: snapshot,
            verdict,
        }
    }
}
