//! 虚拟用户循环
//!
//! 状态机: `Idle → Running → (Sleeping ⇄ Running)* → Stopped`
//!
//! 停止信号只在迭代之间和思考时间内观察，不会打断进行中的请求。

use std::sync::Arc;

use tokio::sync::watch;

use crate::check::run_checks;
use crate::executor::RequestExecutor;
use crate::metrics::MetricsAggregator;
use crate::model::scenario::Scenario;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VuState {
    Idle,
    Running,
    Sleeping,
    Stopped,
}

pub(crate) struct VirtualUser {
    id: u32,
    scenario: Arc<Scenario>,
    executor: Arc<dyn RequestExecutor>,
    metrics: Arc<MetricsAggregator>,
    state: VuState,
    completed: u64,
}

impl VirtualUser {
    pub(crate) fn new(
        id: u32,
        scenario: Arc<Scenario>,
        executor: Arc<dyn RequestExecutor>,
        metrics: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            id,
            scenario,
            executor,
            metrics,
            state: VuState::Idle,
            completed: 0,
        }
    }

    /// 运行直到停止，返回完成的迭代数
    pub(crate) async fn run(mut self, mut stop: watch::Receiver<bool>) -> u64 {
        loop {
            match self.state {
                VuState::Idle | VuState::Sleeping => {
                    if self.should_stop(&stop) {
                        self.transition(VuState::Stopped);
                    } else {
                        self.transition(VuState::Running);
                    }
                }
                VuState::Running => {
                    self.iterate().await;
                    self.completed += 1;

                    if self.reached_iteration_limit() {
                        self.transition(VuState::Stopped);
                    } else {
                        self.transition(VuState::Sleeping);
                        self.think(&mut stop).await;
                    }
                }
                VuState::Stopped => break,
            }
        }

        self.completed
    }

    fn transition(&mut self, next: VuState) {
        tracing::trace!("VU#{}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    fn should_stop(&self, stop: &watch::Receiver<bool>) -> bool {
        *stop.borrow() || self.reached_iteration_limit()
    }

    fn reached_iteration_limit(&self) -> bool {
        self.scenario
            .iterations
            .is_some_and(|limit| self.completed >= limit)
    }

    /// 按顺序执行一次全部请求
    async fn iterate(&self) {
        for spec in &self.scenario.requests {
            let record = self.executor.execute(spec).await;

            let failed = record.is_transport_error() || !spec.is_expected_status(record.status);
            self.metrics.record(&spec.tag, record.elapsed, failed);

            for result in run_checks(&record, &spec.checks) {
                if !result.passed {
                    tracing::debug!("VU#{} 检查未通过 [{}] {}", self.id, result.tag, result.name);
                }
                self.metrics.record_check(&result);
            }
        }
    }

    /// 思考时间，收到停止信号时提前结束
    async fn think(&self, stop: &mut watch::Receiver<bool>) {
        let think_time = self.scenario.think_time;
        if *stop.borrow() {
            return;
        }
        if think_time.is_zero() {
            // 让出调度，避免零思考时间下独占工作线程
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(think_time) => {}
            _ = stop.changed() => {}
        }
    }
}
