//! 封闭的指标序列统计

use super::Sample;

/// 单个 tag 的封闭序列
///
/// 构造时即按耗时排序，之后所有统计都是对同一有序集合的纯函数，重复求值结果一致。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSeries {
    /// 已排序的耗时（毫秒）
    durations_ms: Vec<f64>,
    failed: u64,
}

impl MetricSeries {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut durations_ms: Vec<f64> = samples
            .iter()
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .collect();
        durations_ms.sort_by(f64::total_cmp);
        let failed = samples.iter().filter(|s| s.failed).count() as u64;
        Self {
            durations_ms,
            failed,
        }
    }

    /// 合并多个序列
    pub fn merge<'a, I>(series: I) -> Self
    where
        I: IntoIterator<Item = &'a MetricSeries>,
    {
        let mut durations_ms = Vec::new();
        let mut failed = 0;
        for s in series {
            durations_ms.extend_from_slice(&s.durations_ms);
            failed += s.failed;
        }
        durations_ms.sort_by(f64::total_cmp);
        Self {
            durations_ms,
            failed,
        }
    }

    pub fn len(&self) -> usize {
        self.durations_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations_ms.is_empty()
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// 失败样本占比
    pub fn failure_rate(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.failed as f64 / self.len() as f64)
    }

    /// 最近秩法（nearest-rank）百分位，单位毫秒
    ///
    /// rank = ceil(p * n / 100)，取第 rank 个有序样本
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let n = self.len();
        let rank = (p * n as f64 / 100.0).ceil() as usize;
        let index = rank.clamp(1, n) - 1;
        Some(self.durations_ms[index])
    }

    pub fn median(&self) -> Option<f64> {
        self.percentile(50.0)
    }

    pub fn min(&self) -> Option<f64> {
        self.durations_ms.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.durations_ms.last().copied()
    }

    pub fn avg(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.durations_ms.iter().sum::<f64>() / self.len() as f64)
    }
}
