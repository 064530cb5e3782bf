//! Fetch-cycle orchestration: trigger handling, single-flight guard, publishing.
//!
//! Every start bumps a generation counter and cancels the previous cycle's
//! token, so the most recently *requested* cycle is the only one allowed to
//! publish. Results travel to subscribers through a `watch` channel; a
//! failed cycle leaves the last published snapshot in place and records the
//! failure next to it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use common::error::FetchError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::{summarize, PortfolioSummary};
use crate::fetcher::{fetch_all_assets, AssetPager, FetchSettings};
use crate::normalizer::{normalize_all, NormalizedAssetRecord};
use crate::scoring_table::ScoringTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching { generation: u64, wallet: String },
}

/// Last successfully published result.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    /// 0 until the first cycle publishes.
    pub generation: u64,
    pub wallet: String,
    pub records: Arc<[NormalizedAssetRecord]>,
    pub summary: PortfolioSummary,
    pub pages: usize,
    pub published_at: Option<DateTime<Utc>>,
}

impl Default for PortfolioSnapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            wallet: String::new(),
            records: Arc::from(Vec::new()),
            summary: PortfolioSummary::default(),
            pages: 0,
            published_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleFailure {
    pub generation: u64,
    pub wallet: String,
    pub kind: &'static str,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// What subscribers observe.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioView {
    pub state: CycleState,
    pub snapshot: PortfolioSnapshot,
    pub last_failure: Option<CycleFailure>,
}

impl Default for PortfolioView {
    fn default() -> Self {
        Self {
            state: CycleState::Idle,
            snapshot: PortfolioSnapshot::default(),
            last_failure: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Published {
        generation: u64,
        summary: PortfolioSummary,
    },
    Failed {
        generation: u64,
        error: FetchError,
    },
    /// A newer cycle was requested before this one finished.
    Superseded { generation: u64 },
}

/// Records and summary produced by one uninterrupted cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    pub records: Vec<NormalizedAssetRecord>,
    pub summary: PortfolioSummary,
    pub pages: usize,
}

/// Fetch, normalize and aggregate one wallet's assets.
pub async fn run_cycle<P: AssetPager + Sync>(
    pager: &P,
    wallet: &str,
    settings: &FetchSettings,
    cancel: &CancellationToken,
) -> Result<CycleResult, FetchError> {
    let fetched = fetch_all_assets(pager, wallet, settings, cancel).await?;
    let records = normalize_all(fetched.records, ScoringTable::global());
    let summary = summarize(&records);
    Ok(CycleResult {
        records,
        summary,
        pages: fetched.pages,
    })
}

pub struct CycleHandle {
    pub generation: u64,
    handle: JoinHandle<CycleOutcome>,
}

impl CycleHandle {
    pub async fn outcome(self) -> Result<CycleOutcome> {
        Ok(self.handle.await?)
    }
}

#[derive(Debug, Default)]
struct Guard {
    generation: u64,
    cancel: Option<CancellationToken>,
    wallet: String,
    collection: String,
}

fn lock(guard: &Mutex<Guard>) -> MutexGuard<'_, Guard> {
    guard.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Orchestrator<P> {
    pager: Arc<P>,
    settings: FetchSettings,
    guard: Arc<Mutex<Guard>>,
    view: Arc<watch::Sender<PortfolioView>>,
}

impl<P> Orchestrator<P>
where
    P: AssetPager + Send + Sync + 'static,
{
    pub fn new(pager: P, settings: FetchSettings) -> Self {
        let (view, _) = watch::channel(PortfolioView::default());
        Self {
            pager: Arc::new(pager),
            settings,
            guard: Arc::new(Mutex::new(Guard::default())),
            view: Arc::new(view),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PortfolioView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> PortfolioView {
        self.view.borrow().clone()
    }

    /// Record new form inputs. Starts a cycle once both are non-empty; the
    /// collection address is otherwise unused.
    pub fn inputs_changed(&self, wallet: &str, collection: &str) -> Option<CycleHandle> {
        let wallet = wallet.trim();
        let collection = collection.trim();
        {
            let mut guard = lock(&self.guard);
            guard.wallet = wallet.to_string();
            guard.collection = collection.to_string();
        }
        if wallet.is_empty() || collection.is_empty() {
            debug!(
                has_wallet = !wallet.is_empty(),
                has_collection = !collection.is_empty(),
                "inputs incomplete, not fetching"
            );
            return None;
        }
        Some(self.start_cycle(wallet))
    }

    /// Re-run the pipeline for the last recorded wallet.
    pub fn refresh(&self) -> Option<CycleHandle> {
        let wallet = lock(&self.guard).wallet.clone();
        if wallet.is_empty() {
            warn!("refresh requested without a wallet address");
            return None;
        }
        Some(self.start_cycle(&wallet))
    }

    /// Start a cycle for `wallet`, cancelling whatever is in flight.
    pub fn start_cycle(&self, wallet: &str) -> CycleHandle {
        let (generation, cancel) = {
            let mut guard = lock(&self.guard);
            if let Some(previous) = guard.cancel.take() {
                previous.cancel();
                debug!(generation = guard.generation, "cancelled in-flight cycle");
            }
            guard.generation += 1;
            let generation = guard.generation;
            let cancel = CancellationToken::new();
            guard.cancel = Some(cancel.clone());
            self.view.send_modify(|v| {
                v.state = CycleState::Fetching {
                    generation,
                    wallet: wallet.to_string(),
                };
            });
            (generation, cancel)
        };

        info!(generation, wallet, "fetch cycle started");

        let pager = Arc::clone(&self.pager);
        let settings = self.settings.clone();
        let guard = Arc::clone(&self.guard);
        let view = Arc::clone(&self.view);
        let wallet = wallet.to_string();
        let handle = tokio::spawn(async move {
            let result = run_cycle(pager.as_ref(), &wallet, &settings, &cancel).await;
            finish_cycle(&guard, &view, generation, wallet, result)
        });

        CycleHandle { generation, handle }
    }

    /// Cancel the in-flight cycle, if any, without starting another.
    pub fn cancel_active(&self) {
        let mut guard = lock(&self.guard);
        if let Some(cancel) = guard.cancel.take() {
            cancel.cancel();
            guard.generation += 1;
            self.view.send_modify(|v| v.state = CycleState::Idle);
            info!("fetch cycle cancelled");
        }
    }
}

fn finish_cycle(
    guard: &Mutex<Guard>,
    view: &watch::Sender<PortfolioView>,
    generation: u64,
    wallet: String,
    result: Result<CycleResult, FetchError>,
) -> CycleOutcome {
    let mut guard = lock(guard);
    if guard.generation != generation {
        debug!(generation, latest = guard.generation, "discarding superseded cycle");
        metrics::counter!("portfolio_cycles_total", "outcome" => "superseded").increment(1);
        return CycleOutcome::Superseded { generation };
    }
    guard.cancel = None;

    match result {
        Ok(res) => {
            let summary = res.summary;
            metrics::counter!("portfolio_cycles_total", "outcome" => "published").increment(1);
            metrics::gauge!("portfolio_assets_fetched").set(res.records.len() as f64);
            metrics::gauge!("portfolio_total_points").set(summary.total_points as f64);
            metrics::gauge!("portfolio_holo_points").set(summary.holo_points as f64);
            info!(
                generation,
                wallet = %wallet,
                assets = res.records.len(),
                pages = res.pages,
                total_points = summary.total_points,
                holo_points = summary.holo_points,
                "portfolio published"
            );
            view.send_modify(|v| {
                v.state = CycleState::Idle;
                v.last_failure = None;
                v.snapshot = PortfolioSnapshot {
                    generation,
                    wallet,
                    records: Arc::from(res.records),
                    summary,
                    pages: res.pages,
                    published_at: Some(Utc::now()),
                };
            });
            CycleOutcome::Published {
                generation,
                summary,
            }
        }
        Err(e) => {
            metrics::counter!("portfolio_cycles_total", "outcome" => "failed").increment(1);
            error!(
                generation,
                wallet = %wallet,
                kind = e.kind(),
                error = %e,
                "fetch cycle failed, keeping previous portfolio"
            );
            view.send_modify(|v| {
                v.state = CycleState::Idle;
                v.last_failure = Some(CycleFailure {
                    generation,
                    wallet,
                    kind: e.kind(),
                    message: e.to_string(),
                    at: Utc::now(),
                });
            });
            CycleOutcome::Failed {
                generation,
                error: e,
            }
        }
    }
}
