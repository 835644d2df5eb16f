//! Simulation command: a worker over an in-memory store and scripted network.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use offline_cache::{KvCacheStorage, MemoryKv};
use offline_core::{Method, OfflineConfig, Request, Uri};
use offline_router::testing::ScriptedFetcher;
use offline_router::{Interception, OfflineWorker};
use serde::Serialize;

use super::{resolve_target, SimulateArgs};
use crate::context::Context;
use crate::output::outcome_badge;

#[derive(Serialize)]
struct Outcome {
    pass: &'static str,
    url: String,
    destination: String,
    strategy: String,
    outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct Report {
    version: String,
    precached: usize,
    pruned: Vec<String>,
    requests: Vec<Outcome>,
    stored_entries: usize,
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;

    let targets = if args.urls.is_empty() {
        default_targets(config)
    } else {
        args.urls.clone()
    };
    let uris = targets
        .iter()
        .map(|t| resolve_target(config, t))
        .collect::<Result<Vec<_>>>()?;

    let storage = Arc::new(KvCacheStorage::new(MemoryKv::new()));
    let network = Arc::new(ScriptedFetcher::echo());
    for url in &args.fail {
        let uri = resolve_target(config, url)?;
        network.fail(&uri.to_string(), "scripted failure");
    }

    let worker = OfflineWorker::new(config.clone(), storage, network.clone())?;

    ctx.output.header(&format!("Simulating generation {}", config.version));
    let precached = worker.setup().await.context("Setup failed")?;
    ctx.output
        .success(&format!("Pre-cached {} entries", precached));
    let pruned = worker.promote().await?;
    ctx.output.success(&format!("Promoted ({})", worker.state()));

    let mut requests = run_pass(&worker, "online", &uris).await;
    if args.offline {
        network.set_offline(true);
        ctx.output.debug("network is now offline");
        requests.extend(run_pass(&worker, "offline", &uris).await);
    }

    let stored_entries = worker
        .generations()
        .ensure_current_generation()
        .await?
        .keys()
        .await?
        .len();

    let report = Report {
        version: config.version.clone(),
        precached,
        pruned,
        requests,
        stored_entries,
    };

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    print_report(&report, ctx);
    Ok(())
}

async fn run_pass(worker: &OfflineWorker, pass: &'static str, uris: &[Uri]) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(uris.len());

    for uri in uris {
        let request = Request::new(Method::GET, uri.clone());
        let (destination, strategy) = worker.router().plan(&request);

        let mut outcome = Outcome {
            pass,
            url: uri.to_string(),
            destination: destination.to_string(),
            strategy: strategy.to_string(),
            outcome: String::new(),
            status: None,
            error: None,
        };

        match worker.intercept(request).await {
            Interception::Passthrough(_) => outcome.outcome = "PASSTHROUGH".into(),
            Interception::Respond(Ok(response)) => {
                outcome.status = Some(response.status().as_u16());
                outcome.outcome = response.cache_status().unwrap_or("-").to_string();
            }
            Interception::Respond(Err(e)) => {
                outcome.outcome = "FAILED".into();
                outcome.error = Some(e.to_string());
            }
        }

        // Settle detached writes so the next request sees them.
        worker.flush_population().await;
        outcomes.push(outcome);
    }

    outcomes
}

fn default_targets(config: &OfflineConfig) -> Vec<String> {
    let mut targets = config.precache.clone();
    targets.extend(
        config
            .asset_hosts
            .iter()
            .chain(&config.realtime_hosts)
            .map(|host| format!("https://{}/", host)),
    );
    targets
}

fn print_report(report: &Report, ctx: &Context) {
    if !report.pruned.is_empty() {
        ctx.output
            .info(&format!("Pruned: {}", report.pruned.join(", ")));
    }

    ctx.output.header("Requests");
    let width = report
        .requests
        .iter()
        .map(|r| r.url.len())
        .max()
        .unwrap_or(0);

    for row in &report.requests {
        let status = row
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let badge = outcome_badge(&row.outcome);
        ctx.output.table_row(
            &[row.pass, &row.url, &row.strategy, &status, &badge],
            &[7, width, 14, 3, 8],
        );
        if let Some(ref error) = row.error {
            ctx.output.debug(error);
        }
    }

    ctx.output.kv("stored entries", &report.stored_entries.to_string());
}
