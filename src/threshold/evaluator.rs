//! 阈值求值
//!
//! 运行窗口关闭后，对封闭的指标序列逐条求值阈值并生成最终判定。
//! 每条阈值独立求值，结果与阈值顺序无关。

use serde::Serialize;

use super::{Aggregate, Comparator, Metric, Threshold};
use crate::metrics::{MetricSeries, MetricsSnapshot};

/// 单条阈值的求值状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Met,
    Violated,
    /// 零样本且配置了 `requireSamples: false`
    NoData,
}

/// 单条阈值的求值结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdOutcome {
    /// 阈值的可读描述
    pub threshold: String,
    pub tag: Option<String>,
    pub comparator: Comparator,
    pub limit: f64,
    /// 实际观测值（零样本时为 None）
    pub observed: Option<f64>,
    pub samples: usize,
    pub status: OutcomeStatus,
}

impl ThresholdOutcome {
    pub fn is_violation(&self) -> bool {
        self.status == OutcomeStatus::Violated
    }
}

/// 最终判定
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub passed: bool,
    pub outcomes: Vec<ThresholdOutcome>,
}

impl Verdict {
    pub fn violations(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.outcomes.iter().filter(|o| o.is_violation())
    }
}

/// 对全部阈值求值
///
/// 只要任意阈值被违反，判定即为失败；检查结果不参与判定。
pub fn evaluate(metrics: &MetricsSnapshot, thresholds: &[Threshold]) -> Verdict {
    let outcomes: Vec<ThresholdOutcome> = thresholds
        .iter()
        .map(|threshold| {
            let series = metrics.select(threshold.tag.as_deref());
            evaluate_one(threshold, &series)
        })
        .collect();

    let passed = !outcomes.iter().any(ThresholdOutcome::is_violation);

    for outcome in outcomes.iter().filter(|o| o.is_violation()) {
        tracing::warn!(
            "阈值未满足: {} (观测值: {})",
            outcome.threshold,
            outcome
                .observed
                .map(|v| format!("{:.4}", v))
                .unwrap_or_else(|| "无样本".to_string())
        );
    }

    Verdict { passed, outcomes }
}

fn evaluate_one(threshold: &Threshold, series: &MetricSeries) -> ThresholdOutcome {
    let observed = observe(threshold, series);

    let status = match observed {
        Some(value) if threshold.comparator.holds(value, threshold.limit) => OutcomeStatus::Met,
        Some(_) => OutcomeStatus::Violated,
        None if threshold.require_samples => OutcomeStatus::Violated,
        None => OutcomeStatus::NoData,
    };

    ThresholdOutcome {
        threshold: threshold.to_string(),
        tag: threshold.tag.clone(),
        comparator: threshold.comparator,
        limit: threshold.limit,
        observed,
        samples: series.len(),
        status,
    }
}

fn observe(threshold: &Threshold, series: &MetricSeries) -> Option<f64> {
    match (threshold.metric, threshold.aggregate) {
        (Metric::Failed, _) => series.failure_rate(),
        (Metric::Duration, Aggregate::Percentile(p)) => series.percentile(p),
        (Metric::Duration, Aggregate::Avg) => series.avg(),
        (Metric::Duration, Aggregate::Min) => series.min(),
        (Metric::Duration, Aggregate::Max) => series.max(),
        (Metric::Duration, Aggregate::Med) => series.median(),
        // 解析阶段已拒绝 duration + rate 组合
        (Metric::Duration, Aggregate::Rate) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsAggregator;
    use std::time::Duration;

    fn snapshot_with(samples: &[(&str, u64, bool)]) -> MetricsSnapshot {
        let mut tags: Vec<&str> = samples.iter().map(|(tag, _, _)| *tag).collect();
        tags.push("positive");
        tags.push("negative");
        let aggregator = MetricsAggregator::new(tags);
        for (tag, ms, failed) in samples {
            aggregator.record(tag, Duration::from_millis(*ms), *failed);
        }
        aggregator.snapshot()
    }

    fn threshold(key: &str, expr: &str) -> Threshold {
        Threshold::parse(key, expr, true).unwrap()
    }

    #[test]
    fn test_all_thresholds_met() {
        let snapshot = snapshot_with(&[("positive", 20, false), ("positive", 40, false)]);
        let verdict = evaluate(
            &snapshot,
            &[
                threshold("http_req_duration{req:positive}", "p(95)<1500"),
                threshold("http_req_failed{req:positive}", "rate==0"),
            ],
        );

        assert!(verdict.passed);
        assert_eq!(verdict.outcomes.len(), 2);
        assert_eq!(verdict.outcomes[0].observed, Some(40.0));
        assert_eq!(verdict.outcomes[1].observed, Some(0.0));
        assert_eq!(verdict.violations().count(), 0);
    }

    #[test]
    fn test_zero_samples_violates_by_default() {
        let snapshot = snapshot_with(&[("positive", 20, false)]);
        let verdict = evaluate(&snapshot, &[threshold("http_req_failed{req:negative}", "rate<0.5")]);

        assert!(!verdict.passed);
        let outcome = &verdict.outcomes[0];
        assert_eq!(outcome.status, OutcomeStatus::Violated);
        assert_eq!(outcome.observed, None);
        assert_eq!(outcome.samples, 0);
    }

    #[test]
    fn test_zero_samples_allowed_when_not_required() {
        let snapshot = snapshot_with(&[("positive", 20, false)]);
        let relaxed = Threshold::parse("http_req_failed{req:negative}", "rate<0.5", false).unwrap();
        let verdict = evaluate(&snapshot, &[relaxed]);

        assert!(verdict.passed);
        assert_eq!(verdict.outcomes[0].status, OutcomeStatus::NoData);
    }

    #[test]
    fn test_untagged_threshold_merges_all_tags() {
        let snapshot = snapshot_with(&[
            ("positive", 10, false),
            ("negative", 10, true),
            ("negative", 10, false),
            ("positive", 10, false),
        ]);
        let verdict = evaluate(&snapshot, &[threshold("http_req_failed", "rate<0.2")]);

        assert!(!verdict.passed);
        assert_eq!(verdict.outcomes[0].observed, Some(0.25));
        assert_eq!(verdict.outcomes[0].samples, 4);
    }

    #[test]
    fn test_one_violation_fails_regardless_of_others() {
        let snapshot = snapshot_with(&[("positive", 250, false)]);
        let verdict = evaluate(
            &snapshot,
            &[
                threshold("http_req_failed{req:positive}", "rate<0.01"),
                threshold("http_req_duration{req:positive}", "max<100"),
            ],
        );

        assert!(!verdict.passed);
        let violations: Vec<_> = verdict.violations().collect();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].limit, 100.0);
        assert_eq!(violations[0].observed, Some(250.0));
    }

    #[test]
    fn test_evaluation_is_order_independent() {
        let snapshot = snapshot_with(&[("positive", 30, false), ("positive", 90, true)]);
        let a = threshold("http_req_duration{req:positive}", "avg<50");
        let b = threshold("http_req_failed{req:positive}", "rate<0.6");

        let forward = evaluate(&snapshot, &[a.clone(), b.clone()]);
        let backward = evaluate(&snapshot, &[b, a]);

        assert_eq!(forward.passed, backward.passed);
        assert_eq!(forward.outcomes[0].status, backward.outcomes[1].status);
        assert_eq!(forward.outcomes[1].status, backward.outcomes[0].status);
        assert_eq!(forward.outcomes[0].observed, backward.outcomes[1].observed);
    }
}
