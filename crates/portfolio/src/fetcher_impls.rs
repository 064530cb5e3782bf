use common::error::FetchError;
use common::imx::ImxClient;
use common::types::AssetPage;
use std::time::Instant;

use crate::fetcher::AssetPager;

fn record_request(result: &Result<AssetPage, FetchError>, start: Instant) {
    let ms = start.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!("portfolio_api_latency_ms", "endpoint" => "assets").record(ms);
    match result {
        Ok(_) => {
            metrics::counter!("portfolio_api_requests_total", "endpoint" => "assets", "status" => "ok").increment(1);
        }
        Err(e) => {
            metrics::counter!("portfolio_api_requests_total", "endpoint" => "assets", "status" => "error").increment(1);
            metrics::counter!(
                "portfolio_api_errors_total",
                "endpoint" => "assets",
                "kind" => e.kind()
            )
            .increment(1);
        }
    }
}

impl AssetPager for ImxClient {
    fn assets_url(&self, user: &str, cursor: Option<&str>) -> String {
        ImxClient::assets_url(self, user, cursor)
    }

    async fn fetch_assets_page(
        &self,
        user: &str,
        cursor: Option<&str>,
    ) -> Result<AssetPage, FetchError> {
        let start = Instant::now();
        let res = self.fetch_assets_raw(user, cursor).await;
        record_request(&res, start);
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_request_metrics_record_status_and_error_kind() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_request(&Ok(AssetPage::default()), Instant::now());
            record_request(
                &Err(FetchError::Status {
                    status: 503,
                    body: String::new(),
                }),
                Instant::now(),
            );
        });

        let rendered = handle.render();
        assert!(rendered.contains("portfolio_api_latency_ms"));
        assert!(rendered.contains(r#"portfolio_api_requests_total{endpoint="assets",status="ok"} 1"#));
        assert!(rendered.contains(r#"portfolio_api_errors_total{endpoint="assets",kind="http_5xx"} 1"#));
    }

    #[test]
    fn test_trait_url_matches_client_url() {
        let client = ImxClient::new("https://api.x.immutable.com").unwrap();
        assert_eq!(
            AssetPager::assets_url(&client, "0xabc", Some("c1")),
            client.assets_url("0xabc", Some("c1"))
        );
    }
}
