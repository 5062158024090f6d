//! 运行报告
//!
//! 文本摘要输出到 stdout，JSON 报告可选写入文件。

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::metrics::{CheckTally, MetricSeries};
use crate::runner::RunSummary;
use crate::threshold::{OutcomeStatus, ThresholdOutcome};

/// 单个 tag 的统计
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagReport {
    pub requests: usize,
    pub failed: u64,
    pub failure_rate: Option<f64>,
    pub avg_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p90_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl From<&MetricSeries> for TagReport {
    fn from(series: &MetricSeries) -> Self {
        Self {
            requests: series.len(),
            failed: series.failed(),
            failure_rate: series.failure_rate(),
            avg_ms: series.avg(),
            p50_ms: series.percentile(50.0),
            p90_ms: series.percentile(90.0),
            p95_ms: series.percentile(95.0),
            max_ms: series.max(),
        }
    }
}

/// JSON 报告
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport<'a> {
    pub run_id: String,
    pub scenario: &'a str,
    pub started_at: String,
    pub elapsed_ms: u128,
    pub vus: u32,
    pub iterations: u64,
    pub passed: bool,
    pub tags: BTreeMap<&'a str, TagReport>,
    pub thresholds: &'a [ThresholdOutcome],
    pub checks: &'a BTreeMap<String, BTreeMap<String, CheckTally>>,
}

impl<'a> RunReport<'a> {
    pub fn new(summary: &'a RunSummary) -> Self {
        Self {
            run_id: summary.run_id.to_string(),
            scenario: &summary.scenario,
            started_at: summary.started_at.to_rfc3339(),
            elapsed_ms: summary.elapsed.as_millis(),
            vus: summary.vus,
            iterations: summary.iterations,
            passed: summary.verdict.passed,
            tags: summary
                .metrics
                .series
                .iter()
                .map(|(tag, series)| (tag.as_str(), TagReport::from(series)))
                .collect(),
            thresholds: &summary.verdict.outcomes,
            checks: &summary.metrics.checks,
        }
    }
}

/// 写入 JSON 报告
pub fn write_json(summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let content =
        serde_json::to_string_pretty(&RunReport::new(summary)).context("序列化运行报告失败")?;
    fs::write(path, content)
        .with_context(|| format!("写入运行报告失败: {}", path.display()))?;
    tracing::info!("运行报告已写入: {}", path.display());
    Ok(())
}

fn ms(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}ms", v))
        .unwrap_or_else(|| "-".to_string())
}

/// 渲染文本摘要
pub fn render_text(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "场景: {} ({})", summary.scenario, summary.run_id);
    let _ = writeln!(
        out,
        "虚拟用户: {}  迭代: {}  请求: {}  耗时: {:.2}s",
        summary.vus,
        summary.iterations,
        summary.metrics.total_requests(),
        summary.elapsed.as_secs_f64()
    );

    let _ = writeln!(out, "\n指标:");
    for (tag, series) in &summary.metrics.series {
        let r = TagReport::from(series);
        let _ = writeln!(
            out,
            "  [{}] requests={} failed={} ({:.2}%) avg={} p50={} p90={} p95={} max={}",
            tag,
            r.requests,
            r.failed,
            r.failure_rate.unwrap_or(0.0) * 100.0,
            ms(r.avg_ms),
            ms(r.p50_ms),
            ms(r.p90_ms),
            ms(r.p95_ms),
            ms(r.max_ms)
        );
    }

    let _ = writeln!(out, "\n检查:");
    for (tag, checks) in &summary.metrics.checks {
        for (name, tally) in checks {
            let mark = if tally.fails == 0 { "✓" } else { "✗" };
            let _ = writeln!(
                out,
                "  {} [{}] {}: {}/{} 通过",
                mark,
                tag,
                name,
                tally.passes,
                tally.total()
            );
        }
    }

    let _ = writeln!(out, "\n阈值:");
    if summary.verdict.outcomes.is_empty() {
        let _ = writeln!(out, "  (未配置)");
    }
    for outcome in &summary.verdict.outcomes {
        let (mark, note) = match outcome.status {
            OutcomeStatus::Met => ("✓", String::new()),
            OutcomeStatus::Violated => ("✗", " 未满足".to_string()),
            OutcomeStatus::NoData => ("-", " 无样本（已跳过）".to_string()),
        };
        let observed = outcome
            .observed
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "无样本".to_string());
        let _ = writeln!(
            out,
            "  {} {}  观测值={} 要求{}{}{}",
            mark, outcome.threshold, observed, outcome.comparator, outcome.limit, note
        );
    }

    let _ = writeln!(
        out,
        "\n判定: {}",
        if summary.verdict.passed { "通过" } else { "失败" }
    );
    out
}
