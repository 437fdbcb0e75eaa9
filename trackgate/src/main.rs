use clap::{Args, Parser};
use std::path::PathBuf;

mod config;
use config::{Config, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
enum CliCommand {
    /// Serve the tracking gateway
    Gateway(GatewayArgs),
    /// Show all metrics definitions as markdown table
    ShowMetrics,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("Failed to load config file: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("Failed to create runtime: {0}")]
    RuntimeError(#[from] std::io::Error),
}

fn main() {
    init_tracing();

    if let Err(e) = cli() {
        tracing::error!(error = %e, "Startup error");
        std::process::exit(1);
    }
}

fn cli() -> Result<(), CliError> {
    let cmd = CliCommand::parse();

    match &cmd {
        CliCommand::Gateway(gateway_args) => {
            let config = Config::from_file(&gateway_args.base.config_file_path)?;
            init_statsd_recorder("trackgate.gateway", config.metrics);

            let gateway_config = config
                .gateway
                .ok_or(CliError::InvalidConfig("Missing gateway config"))?;

            run_async(gateway::run(gateway_config, CancellationToken::new()))?;
            Ok(())
        }
        CliCommand::ShowMetrics => {
            let mut all = Vec::new();
            all.extend_from_slice(tracker::metrics_defs::ALL_METRICS);
            all.extend_from_slice(gateway::metrics_defs::ALL_METRICS);
            println!("{}", generate_metrics_table(&all));
            Ok(())
        }
    }
}

fn generate_metrics_table(metrics: &[shared::metrics_defs::MetricDef]) -> String {
    let mut lines = vec![
        "| Metric | Type | Description |".to_string(),
        "|--------|------|-------------|".to_string(),
    ];
    for m in metrics {
        lines.push(format!(
            "| `{}` | {} | {} |",
            m.name,
            m.metric_type.as_str(),
            m.description
        ));
    }
    lines.join("\n")
}

fn init_statsd_recorder(prefix: &str, metrics_config: Option<MetricsConfig>) {
    if let Some(MetricsConfig {
        statsd_host,
        statsd_port,
    }) = metrics_config
    {
        let recorder = StatsdBuilder::from(statsd_host, statsd_port)
            .build(Some(prefix))
            .expect("Could not create StatsdRecorder");

        metrics::set_global_recorder(recorder).expect("Could not set global metrics recorder")
    }
}

fn run_async(
    fut: impl Future<Output = Result<(), impl std::error::Error>>,
) -> Result<(), CliError> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    if let Err(e) = rt.block_on(fut) {
        tracing::error!(error = %e, "Runtime error");
        process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[derive(Args, Debug, Clone)]
struct BaseArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

#[derive(Args, Debug)]
struct GatewayArgs {
    #[command(flatten)]
    base: BaseArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_table_lists_every_definition() {
        let mut all = Vec::new();
        all.extend_from_slice(tracker::metrics_defs::ALL_METRICS);
        all.extend_from_slice(gateway::metrics_defs::ALL_METRICS);

        let table = generate_metrics_table(&all);
        for m in &all {
            assert!(table.contains(m.name), "table is missing {}", m.name);
        }
    }
}
