use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::display;
use crate::fetcher::AssetPager;
use crate::orchestrator::{CycleOutcome, Orchestrator, PortfolioView};
use crate::scheduler;

const USAGE: &str = "usage: portfolio [--config <path>] <fetch|watch> <wallet> [collection] [--json]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fetch {
        wallet: String,
        collection: Option<String>,
        json: bool,
    },
    Watch {
        wallet: String,
        collection: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<String>,
    pub command: Command,
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Invocation, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let mut config_path = None;
    let mut json = false;
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--config requires a path".to_string())?;
                config_path = Some(path);
            }
            "--json" => json = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("unknown flag: {flag}")),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let cmd = positional.next().ok_or_else(|| USAGE.to_string())?;
    let wallet = positional
        .next()
        .ok_or_else(|| format!("usage: portfolio {cmd} <wallet> [collection]"))?;
    let collection = positional.next();
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument: {extra}"));
    }

    let command = match cmd.as_str() {
        "fetch" => Command::Fetch {
            wallet,
            collection,
            json,
        },
        "watch" if json => return Err("--json is only supported by fetch".to_string()),
        "watch" => Command::Watch { wallet, collection },
        other => return Err(format!("unknown command: {other}")),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

pub async fn run_command<P>(
    orch: &Orchestrator<P>,
    cmd: Command,
    refresh_interval: Duration,
) -> Result<()>
where
    P: AssetPager + Send + Sync + 'static,
{
    match cmd {
        Command::Fetch {
            wallet,
            collection,
            json,
        } => {
            let out = fetch_once(orch, &wallet, collection.as_deref(), json).await?;
            print!("{out}");
            Ok(())
        }
        Command::Watch { wallet, collection } => {
            watch(orch, &wallet, collection.as_deref(), refresh_interval).await
        }
    }
}

/// Run one cycle and render the published portfolio.
pub async fn fetch_once<P>(
    orch: &Orchestrator<P>,
    wallet: &str,
    collection: Option<&str>,
    json: bool,
) -> Result<String>
where
    P: AssetPager + Send + Sync + 'static,
{
    let handle = orch
        .inputs_changed(wallet, collection.unwrap_or_default())
        .or_else(|| orch.refresh())
        .ok_or_else(|| anyhow::anyhow!("wallet address must not be empty"))?;

    match handle.outcome().await? {
        CycleOutcome::Published { .. } => {
            let snapshot = orch.view().snapshot;
            if json {
                let mut out = display::render_json(&snapshot)?;
                out.push('\n');
                Ok(out)
            } else {
                Ok(format!(
                    "{}\n{}",
                    display::render_summary(&snapshot.summary),
                    display::render_table(&snapshot.records)
                ))
            }
        }
        CycleOutcome::Failed { error, .. } => {
            Err(anyhow::Error::new(error).context(format!("fetching assets for {wallet} failed")))
        }
        CycleOutcome::Superseded { generation } => {
            anyhow::bail!("cycle {generation} was superseded before it finished")
        }
    }
}

async fn watch<P>(
    orch: &Orchestrator<P>,
    wallet: &str,
    collection: Option<&str>,
    refresh_interval: Duration,
) -> Result<()>
where
    P: AssetPager + Send + Sync + 'static,
{
    let mut views = orch.subscribe();
    if orch
        .inputs_changed(wallet, collection.unwrap_or_default())
        .or_else(|| orch.refresh())
        .is_none()
    {
        anyhow::bail!("wallet address must not be empty");
    }

    let stop = CancellationToken::new();
    let (tick_tx, mut ticks) = mpsc::channel::<()>(8);
    let _tickers = scheduler::start(
        vec![scheduler::JobSpec {
            name: "portfolio_refresh".to_string(),
            interval: refresh_interval,
            tick: tick_tx,
            run_immediately: false,
        }],
        &stop,
    );
    tracing::info!(wallet, interval = ?refresh_interval, "watching portfolio");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0_u64;
    let mut reported_failure = 0_u64;
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("failed to listen for ctrl-c")?;
                tracing::info!("ctrl-c received, stopping watch");
                break;
            }
            Some(()) = ticks.recv() => {
                let _ = orch.refresh();
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                report(&view, &mut printed, &mut reported_failure);
            }
        }
    }

    stop.cancel();
    orch.cancel_active();
    Ok(())
}

fn report(view: &PortfolioView, printed: &mut u64, reported_failure: &mut u64) {
    if view.snapshot.generation > *printed {
        *printed = view.snapshot.generation;
        let stamp = view
            .snapshot
            .published_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        println!(
            "[{stamp}] {} ({} assets)\n{}",
            view.snapshot.wallet,
            view.snapshot.records.len(),
            display::render_summary(&view.snapshot.summary)
        );
    }
    if let Some(failure) = &view.last_failure {
        if failure.generation > *reported_failure {
            *reported_failure = failure.generation;
            tracing::warn!(
                generation = failure.generation,
                kind = failure.kind,
                error = %failure.message,
                "refresh failed, showing portfolio from generation {}",
                view.snapshot.generation
            );
        }
    }
}
