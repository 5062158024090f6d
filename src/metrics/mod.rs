//! 指标聚合模块
//!
//! 每个 tag 一个独立的追加序列，各自持有一把锁；tag 集合在运行开始前确定，
//! 因此 tag -> 序列的映射本身不可变，不需要全局锁。

mod series;

pub use series::MetricSeries;

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::check::CheckResult;

/// 单个请求样本
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub duration: Duration,
    pub failed: bool,
}

/// 单个检查项的通过/失败计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckTally {
    pub passes: u64,
    pub fails: u64,
}

impl CheckTally {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }
}

/// 单个 tag 的存储桶
#[derive(Default)]
struct TagBucket {
    samples: Mutex<Vec<Sample>>,
    checks: Mutex<BTreeMap<String, CheckTally>>,
}

/// 并发安全的指标聚合器
pub struct MetricsAggregator {
    buckets: HashMap<String, TagBucket>,
}

impl MetricsAggregator {
    /// 以已知 tag 集合创建聚合器
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut buckets = HashMap::new();
        for tag in tags {
            buckets.entry(tag.into()).or_insert_with(TagBucket::default);
        }
        Self { buckets }
    }

    /// 追加一个样本
    pub fn record(&self, tag: &str, duration: Duration, failed: bool) {
        match self.buckets.get(tag) {
            Some(bucket) => bucket.samples.lock().push(Sample { duration, failed }),
            None => tracing::warn!("未注册的 tag，丢弃样本: {}", tag),
        }
    }

    /// 累计一个检查结果
    pub fn record_check(&self, result: &CheckResult) {
        match self.buckets.get(&result.tag) {
            Some(bucket) => {
                let mut checks = bucket.checks.lock();
                let tally = checks.entry(result.name.clone()).or_default();
                if result.passed {
                    tally.passes += 1;
                } else {
                    tally.fails += 1;
                }
            }
            None => tracing::warn!("未注册的 tag，丢弃检查结果: {}", result.tag),
        }
    }

    /// 生成封闭快照（运行窗口结束后调用）
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut series = BTreeMap::new();
        let mut checks = BTreeMap::new();
        for (tag, bucket) in &self.buckets {
            series.insert(tag.clone(), MetricSeries::from_samples(&bucket.samples.lock()));
            checks.insert(tag.clone(), bucket.checks.lock().clone());
        }
        MetricsSnapshot { series, checks }
    }
}

/// 封闭的指标快照（只读）
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub series: BTreeMap<String, MetricSeries>,
    /// tag -> 检查名 -> 计数
    pub checks: BTreeMap<String, BTreeMap<String, CheckTally>>,
}

impl MetricsSnapshot {
    /// 按 tag 选择序列；tag 为 None 时合并所有序列
    pub fn select(&self, tag: Option<&str>) -> Cow<'_, MetricSeries> {
        match tag {
            Some(tag) => self
                .series
                .get(tag)
                .map(Cow::Borrowed)
                .unwrap_or_else(|| Cow::Owned(MetricSeries::default())),
            None => Cow::Owned(MetricSeries::merge(self.series.values())),
        }
    }

    /// 样本总数
    pub fn total_requests(&self) -> usize {
        self.series.values().map(MetricSeries::len).sum()
    }

    /// 失败的检查项总数
    pub fn failed_checks(&self) -> u64 {
        self.checks
            .values()
            .flat_map(|by_name| by_name.values())
            .map(|tally| tally.fails)
            .sum()
    }
}
