use anyhow::{Context, Result};
use std::time::Duration;

use common::config::Config;
use common::imx::ImxClient;
use common::observability::{build_dispatch, LogFormat};
use portfolio::cli;
use portfolio::fetcher::FetchSettings;
use portfolio::orchestrator::Orchestrator;

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    let invocation = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;
    let config = Config::load(invocation.config_path.as_deref())?;

    let (dispatch, _otel_guard) = build_dispatch(
        "portfolio",
        &config.general.log_level,
        LogFormat::parse(&config.general.log_format),
    );
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    if let Some(port) = config.observability.prometheus_port {
        portfolio::metrics::install_prometheus(port)
            .with_context(|| format!("failed to start prometheus exporter on port {port}"))?;
        portfolio::metrics::describe();
    }

    let client = ImxClient::new_with_settings(&config.api.base_url, config.api.request_timeout())?;
    tracing::info!(api_url = client.api_url(), "portfolio starting");

    let orch = Orchestrator::new(client, FetchSettings::from_config(&config));
    let refresh_interval = config
        .watch
        .as_ref()
        .map_or(DEFAULT_REFRESH_INTERVAL, |w| w.refresh_interval());

    cli::run_command(&orch, invocation.command, refresh_interval).await
}
