use common::config::Config;
use common::error::FetchError;
use common::types::{AssetPage, RawAssetRecord};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Source of asset pages for one wallet.
pub trait AssetPager {
    fn assets_url(&self, user: &str, cursor: Option<&str>) -> String;

    fn fetch_assets_page(
        &self,
        user: &str,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<AssetPage, FetchError>> + Send;
}

/// Pacing, timeout and retry policy for one fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub rate_limit_pause: Duration,
    pub page_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_pages: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            rate_limit_pause: Duration::from_millis(200),
            page_timeout: Duration::from_secs(15),
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            max_pages: 1000,
        }
    }
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            rate_limit_pause: config.fetch.rate_limit_pause(),
            page_timeout: config.api.request_timeout(),
            max_retries: config.fetch.max_retries,
            backoff_base: config.fetch.backoff_base(),
            max_pages: config.fetch.max_pages,
        }
    }

    /// Delay before retry `attempt` (0-based): base * 2^attempt.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Every raw record for a wallet, in delivery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedAssets {
    pub records: Vec<RawAssetRecord>,
    pub pages: usize,
}

async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
    tokio::select! {
        () = cancel.cancelled() => Err(FetchError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

async fn fetch_page_with_retry<P: AssetPager + Sync>(
    pager: &P,
    user: &str,
    cursor: Option<&str>,
    settings: &FetchSettings,
    cancel: &CancellationToken,
) -> Result<AssetPage, FetchError> {
    let mut attempt = 0_u32;
    loop {
        let res = tokio::select! {
            () = cancel.cancelled() => return Err(FetchError::Cancelled),
            r = tokio::time::timeout(settings.page_timeout, pager.fetch_assets_page(user, cursor)) => {
                r.unwrap_or_else(|_elapsed| Err(FetchError::Timeout))
            }
        };

        match res {
            Ok(page) => return Ok(page),
            Err(e) if e.is_retryable() && attempt < settings.max_retries => {
                let delay = settings.backoff_delay(attempt);
                attempt += 1;
                warn!(
                    user,
                    attempt,
                    max_retries = settings.max_retries,
                    delay = ?delay,
                    kind = e.kind(),
                    error = %e,
                    "asset page failed, backing off"
                );
                metrics::counter!("portfolio_api_retries_total", "kind" => e.kind()).increment(1);
                pause(delay, cancel).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Walk the cursor chain for `user` until the API stops returning a cursor.
///
/// Pages are requested strictly one after another with `rate_limit_pause`
/// between them. Any terminal failure (or exhausted retries) aborts the whole
/// walk; no partial result is returned.
pub async fn fetch_all_assets<P: AssetPager + Sync>(
    pager: &P,
    user: &str,
    settings: &FetchSettings,
    cancel: &CancellationToken,
) -> Result<FetchedAssets, FetchError> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0_usize;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if pages >= settings.max_pages {
            return Err(FetchError::PageLimit(settings.max_pages));
        }

        let page = fetch_page_with_retry(pager, user, cursor.as_deref(), settings, cancel).await?;
        pages += 1;
        debug!(
            url = %pager.assets_url(user, cursor.as_deref()),
            page = pages,
            count = page.result.len(),
            "asset page received"
        );

        let next = page.next_cursor().map(str::to_string);
        records.extend(page.result);

        let Some(next) = next else {
            break;
        };
        cursor = Some(next);
        pause(settings.rate_limit_pause, cancel).await?;
    }

    info!(user, pages, assets = records.len(), "asset listing complete");
    Ok(FetchedAssets { records, pages })
}


#[cfg(test)]
mod tests {
    use super::testing::{page, ScriptedPager};
    use super::*;
    use tokio::time::Instant;

    fn status(code: u16) -> Result<AssetPage, FetchError> {
        Err(FetchError::Status {
            status: code,
            body: String::new(),
        })
    }

    fn ids(fetched: &FetchedAssets) -> Vec<String> {
        fetched
            .records
            .iter()
            .map(|r| r.token_id.clone().unwrap_or_default())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_concatenates_pages_in_order_and_threads_cursor() {
        let pager = ScriptedPager::new().script(
            "0xw",
            vec![
                page(&["1", "2"], Some("c1")),
                page(&["3"], Some("c2")),
                page(&["4", "5"], None),
            ],
        );

        let fetched = fetch_all_assets(
            &pager,
            "0xw",
            &FetchSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(ids(&fetched), ["1", "2", "3", "4", "5"]);
        assert_eq!(fetched.pages, 3);
        assert_eq!(
            pager.cursors(),
            [None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_between_pages_but_not_after_last() {
        let pager = ScriptedPager::new().script(
            "0xw",
            vec![page(&["1"], Some("c1")), page(&["2"], Some("c2")), page(&["3"], Some(""))],
        );
        let start = Instant::now();
        fetch_all_assets(
            &pager,
            "0xw",
            &FetchSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_empty_page_terminates() {
        let pager = ScriptedPager::new().script("0xw", vec![page(&[], None)]);
        let fetched = fetch_all_assets(
            &pager,
            "0xw",
            &FetchSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(fetched.records.is_empty());
        assert_eq!(fetched.pages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_on_second_page_aborts_without_partial() {
        let pager =
            ScriptedPager::new().script("0xw", vec![page(&["1"], Some("c1")), status(404)]);
        let err = fetch_all_assets(
            &pager,
            "0xw",
            &FetchSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "http_4xx");
        assert_eq!(pager.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_retried_with_backoff() {
        let pager = ScriptedPager::new().script(
            "0xw",
            vec![status(503), status(500), page(&["1"], None)],
        );
        let settings = FetchSettings::default();
        let start = Instant::now();
        let fetched = fetch_all_assets(&pager, "0xw", &settings, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(ids(&fetched), ["1"]);
        assert_eq!(pager.calls().len(), 3);
        // 500ms + 1000ms of backoff, no rate-limit pause after the only page.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1_500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_700), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let pager = ScriptedPager::new().script("0xw", vec![status(400), page(&["1"], None)]);
        let err = fetch_all_assets(
            &pager,
            "0xw",
            &FetchSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 400, .. }));
        assert_eq!(pager.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_error_is_not_retried() {
        let pager = ScriptedPager::new().script(
            "0xw",
            vec![Err(FetchError::Decode("expected `result`".into()))],
        );
        let err = fetch_all_assets(
            &pager,
            "0xw",
            &FetchSettings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert_eq!(pager.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_error() {
        let pager =
            ScriptedPager::new().script("0xw", vec![status(502), status(502), status(503)]);
        let settings = FetchSettings {
            max_retries: 2,
            ..FetchSettings::default()
        };
        let err = fetch_all_assets(&pager, "0xw", &settings, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert_eq!(pager.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_page_times_out_and_is_retried() {
        let pager = ScriptedPager::with_delay(Duration::from_secs(60));
        let settings = FetchSettings {
            max_retries: 1,
            page_timeout: Duration::from_secs(5),
            ..FetchSettings::default()
        };
        let err = fetch_all_assets(&pager, "0xw", &settings, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Timeout);
        assert_eq!(pager.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_makes_no_request() {
        let pager = ScriptedPager::new().script("0xw", vec![page(&["1"], None)]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fetch_all_assets(&pager, "0xw", &FetchSettings::default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Cancelled);
        assert!(pager.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_rate_limit_pause() {
        let pager = ScriptedPager::new().script(
            "0xw",
            vec![page(&["1"], Some("c1")), page(&["2"], None)],
        );
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });
        let err = fetch_all_assets(&pager, "0xw", &FetchSettings::default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Cancelled);
        assert_eq!(pager.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_endless_cursor_hits_page_limit() {
        let responses = (0..10).map(|i| page(&["x"], Some(format!("c{i}").as_str()))).collect();
        let pager = ScriptedPager::new().script("0xw", responses);
        let settings = FetchSettings {
            max_pages: 3,
            ..FetchSettings::default()
        };
        let err = fetch_all_assets(&pager, "0xw", &settings, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::PageLimit(3));
        assert_eq!(pager.calls().len(), 3);
    }

    #[test]
    fn test_backoff_doubles() {
        let s = FetchSettings::default();
        assert_eq!(s.backoff_delay(0), Duration::from_millis(500));
        assert_eq!(s.backoff_delay(1), Duration::from_millis(1_000));
        assert_eq!(s.backoff_delay(3), Duration::from_millis(4_000));
    }
}
