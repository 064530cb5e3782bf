use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "portfolio_api_requests_total",
        "Number of asset page requests made."
    );
    describe_histogram!(
        "portfolio_api_latency_ms",
        "Asset page request latency in milliseconds."
    );
    describe_counter!(
        "portfolio_api_errors_total",
        "Failed asset page requests by error kind."
    );
    describe_counter!(
        "portfolio_api_retries_total",
        "Asset page requests retried after a transient failure."
    );
    describe_counter!(
        "portfolio_cycles_total",
        "Fetch cycles by outcome (published, failed, superseded)."
    );
    describe_gauge!(
        "portfolio_assets_fetched",
        "Assets in the last published portfolio."
    );
    describe_gauge!(
        "portfolio_total_points",
        "Total points of the last published portfolio."
    );
    describe_gauge!(
        "portfolio_holo_points",
        "Holo and DarkHolo points of the last published portfolio."
    );
}

/// Install the global recorder and serve `/metrics` on `port`.
///
/// `install` spawns the HTTP listener and the upkeep task on the current
/// Tokio runtime, so this must be called from inside one.
pub fn install_prometheus(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}
