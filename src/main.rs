mod check;
mod common;
mod executor;
mod http_client;
mod metrics;
mod model;
mod report;
mod runner;
mod threshold;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::executor::HttpExecutor;
use crate::http_client::build_client;
use crate::model::config::ScenarioConfig;
use crate::model::scenario::Scenario;
use crate::runner::ScenarioRunner;

/// 判定失败
const EXIT_VERDICT_FAILED: u8 = 1;
/// 配置错误（运行未开始）
const EXIT_CONFIG_ERROR: u8 = 2;

/// API 契约与负载验证工具
#[derive(Parser, Debug)]
#[command(name = "loadcheck-rs", version, about)]
struct Args {
    /// 场景配置文件（JSON）
    scenario: PathBuf,

    /// 覆盖虚拟用户数
    #[arg(long)]
    vus: Option<u32>,

    /// 覆盖运行时长（如 10s、1m）
    #[arg(long)]
    duration: Option<String>,

    /// 覆盖每个虚拟用户的迭代次数
    #[arg(long)]
    iterations: Option<u64>,

    /// 日志级别（RUST_LOG 优先）
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 将 JSON 报告写入指定文件
    #[arg(long)]
    report_json: Option<PathBuf>,
}

impl Args {
    fn apply_overrides(&self, config: &mut ScenarioConfig) {
        if let Some(vus) = self.vus {
            config.vus = vus;
        }
        if let Some(duration) = &self.duration {
            config.duration = Some(duration.clone());
        }
        if let Some(iterations) = self.iterations {
            config.iterations = Some(iterations);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = match ScenarioConfig::load(&args.scenario) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("加载场景失败: {:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    args.apply_overrides(&mut config);

    let scenario = match Scenario::from_config(&config) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(
                "场景配置无效 ({}): {}",
                config
                    .config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                e
            );
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let client = match build_client(&scenario.client, scenario.vus as usize) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("创建 HTTP Client 失败: {:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let runner = ScenarioRunner::new(scenario, Arc::new(HttpExecutor::new(client)));
    let summary = runner.run().await;

    println!("{}", report::render_text(&summary));

    if let Some(path) = &args.report_json {
        if let Err(e) = report::write_json(&summary, path) {
            tracing::error!("{:#}", e);
        }
    }

    if summary.verdict.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_VERDICT_FAILED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_applied_before_validation() {
        let args = Args::parse_from([
            "loadcheck-rs",
            "scenario.json",
            "--vus",
            "0",
            "--duration",
            "30s",
            "--iterations",
            "7",
        ]);
        let mut config: ScenarioConfig =
            serde_json::from_str(r#"{"vus": 3, "requests": [{"url": "https://example.com"}]}"#)
                .unwrap();
        args.apply_overrides(&mut config);

        assert_eq!(config.vus, 0);
        assert_eq!(config.duration.as_deref(), Some("30s"));
        assert_eq!(config.iterations, Some(7));
        assert!(matches!(
            Scenario::from_config(&config),
            Err(model::error::ConfigError::NoVirtualUsers)
        ));
    }

    #[test]
    fn test_bundled_scenarios_are_valid() {
        for path in [
            "scenarios/rickmorty-characters.json",
            "scenarios/restcountries-smoke.json",
        ] {
            let full = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(path);
            let config = ScenarioConfig::load(&full).unwrap();
            let scenario = Scenario::from_config(&config);
            assert!(scenario.is_ok(), "{}: {:?}", path, scenario.err());
        }
    }
}
