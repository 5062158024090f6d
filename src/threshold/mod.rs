//! 阈值定义与表达式解析
//!
//! 指标键形如 `http_req_duration{req:positive}`，表达式形如 `p(95)<1500`、`rate<0.02`。

mod evaluator;

pub use evaluator::{OutcomeStatus, ThresholdOutcome, Verdict, evaluate};

use std::fmt;

use serde::Serialize;

use crate::model::error::ConfigError;

/// 时长指标名
pub const DURATION_METRIC: &str = "http_req_duration";
/// 失败率指标名
pub const FAILED_METRIC: &str = "http_req_failed";

/// 阈值指标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// 请求耗时（毫秒）
    Duration,
    /// 失败样本占比
    Failed,
}

impl Metric {
    fn name(&self) -> &'static str {
        match self {
            Self::Duration => DURATION_METRIC,
            Self::Failed => FAILED_METRIC,
        }
    }
}

/// 聚合方式
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Percentile(f64),
    Avg,
    Min,
    Max,
    Med,
    Rate,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentile(p) => write!(f, "p({})", p),
            Self::Avg => write!(f, "avg"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Med => write!(f, "med"),
            Self::Rate => write!(f, "rate"),
        }
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparator {
    /// 按长度优先排列，保证 `<=` 先于 `<` 匹配
    const TOKENS: [(&'static str, Comparator); 6] = [
        ("<=", Comparator::Le),
        (">=", Comparator::Ge),
        ("==", Comparator::Eq),
        ("!=", Comparator::Ne),
        ("<", Comparator::Lt),
        (">", Comparator::Gt),
    ];

    pub fn holds(&self, observed: f64, limit: f64) -> bool {
        match self {
            Self::Lt => observed < limit,
            Self::Le => observed <= limit,
            Self::Gt => observed > limit,
            Self::Ge => observed >= limit,
            Self::Eq => observed == limit,
            Self::Ne => observed != limit,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 已解析的阈值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    pub metric: Metric,
    /// 为 None 时对所有 tag 合并求值
    pub tag: Option<String>,
    pub aggregate: Aggregate,
    pub comparator: Comparator,
    pub limit: f64,
    /// 零样本时是否判定为违反
    pub require_samples: bool,
}

impl Threshold {
    /// 解析一个指标键与一条表达式
    pub fn parse(key: &str, expression: &str, require_samples: bool) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidThreshold {
            key: key.to_string(),
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let (metric, tag) = parse_metric_key(key).map_err(|reason| invalid(&reason))?;

        let (lhs, comparator, rhs) = Comparator::TOKENS
            .iter()
            .find_map(|(token, cmp)| {
                expression
                    .split_once(*token)
                    .map(|(l, r)| (l.trim(), *cmp, r.trim()))
            })
            .ok_or_else(|| invalid("缺少比较运算符"))?;

        let aggregate = parse_aggregate(lhs).ok_or_else(|| invalid("未知的聚合方式"))?;
        let limit: f64 = rhs.parse().map_err(|_| invalid("阈值必须是数字"))?;
        if !limit.is_finite() {
            return Err(invalid("阈值必须是有限数字"));
        }

        let compatible = match metric {
            Metric::Duration => !matches!(aggregate, Aggregate::Rate),
            Metric::Failed => matches!(aggregate, Aggregate::Rate),
        };
        if !compatible {
            return Err(invalid("聚合方式与指标不匹配"));
        }

        Ok(Self {
            metric,
            tag,
            aggregate,
            comparator,
            limit,
            require_samples,
        })
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}{{req:{}}}", self.metric.name(), tag)?,
            None => write!(f, "{}", self.metric.name())?,
        }
        write!(f, " {}{}{}", self.aggregate, self.comparator, self.limit)
    }
}

/// 解析 `metric{req:tag}` 形式的指标键
fn parse_metric_key(key: &str) -> Result<(Metric, Option<String>), String> {
    let key = key.trim();
    let (name, tag) = match key.split_once('{') {
        Some((name, rest)) => {
            let inner = rest
                .strip_suffix('}')
                .ok_or_else(|| "标签过滤缺少右花括号".to_string())?;
            let (label, value) = inner
                .split_once(':')
                .ok_or_else(|| "标签过滤格式应为 {req:<tag>}".to_string())?;
            if label.trim() != "req" {
                return Err(format!("不支持的标签过滤键: {}", label.trim()));
            }
            let value = value.trim();
            if value.is_empty() {
                return Err("标签值为空".to_string());
            }
            (name.trim(), Some(value.to_string()))
        }
        None => (key, None),
    };

    let metric = match name {
        DURATION_METRIC => Metric::Duration,
        FAILED_METRIC => Metric::Failed,
        other => return Err(format!("未知指标: {}", other)),
    };
    Ok((metric, tag))
}

fn parse_aggregate(s: &str) -> Option<Aggregate> {
    match s {
        "avg" => Some(Aggregate::Avg),
        "min" => Some(Aggregate::Min),
        "max" => Some(Aggregate::Max),
        "med" => Some(Aggregate::Med),
        "rate" => Some(Aggregate::Rate),
        _ => {
            let inner = s.strip_prefix("p(")?.strip_suffix(')')?;
            let p: f64 = inner.trim().parse().ok()?;
            (p > 0.0 && p <= 100.0).then_some(Aggregate::Percentile(p))
        }
    }
}
