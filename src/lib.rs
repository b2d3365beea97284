// src/lib.rs

pub mod cli;
pub mod clock;
pub mod collector;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod query;
pub mod server;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use prometheus::Registry;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::clock::SystemClock;
use crate::collector::{MetricsRegistry, PrometheusRegistry, Schedule};
use crate::config::ConfigFile;
use crate::engine::{CacheFactory, ErrorCountObserver, Reconciler};
use crate::fs::{FileSystem, RealFileSystem};
use crate::query::{metric_name_for, BigQueryConfig, BigQueryRunner, QueryTemplate};
use crate::watch::QuerySource;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config resolution (file + CLI)
/// - the warehouse query runner
/// - one source watcher per query file
/// - the reconciliation loop and the `/metrics` server
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = config::resolve(&args)?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let template = QueryTemplate::new(Arc::clone(&fs), Utc::now(), cfg.refresh);

    if args.dry_run {
        print_dry_run(&cfg, fs.as_ref(), &template);
        return Ok(());
    }

    let project = cfg
        .project
        .clone()
        .ok_or_else(|| anyhow!("no project configured; pass --project or set [exporter].project"))?;
    let mut bq = BigQueryConfig::new(project);
    if let Some(endpoint) = cfg.api_endpoint.clone() {
        bq.endpoint = endpoint;
    }
    bq.access_token = args.access_token.clone();
    let runner = BigQueryRunner::new(bq, Handle::current())?;

    let registry = PrometheusRegistry::new(Registry::new())?;
    let observer = ErrorCountObserver::register(registry.registry())?;

    let shared: Arc<dyn MetricsRegistry> = Arc::new(registry.clone());
    let sources: Vec<QuerySource> = cfg
        .queries
        .iter()
        .map(|q| {
            QuerySource::new(&q.file, q.kind, Arc::clone(&fs), Arc::clone(&shared))
                .with_cron(q.cron.clone())
                .with_unregister_policy(cfg.unregister_policy)
        })
        .collect();

    let factory = CacheFactory::new(Arc::new(runner), Arc::new(SystemClock), template);
    let reconciler = Reconciler::new(sources, factory, cfg.refresh).with_observer(observer);

    if args.once {
        let (_, report) = reconciler.tick_blocking().await?;
        if report.error_count() > 0 {
            warn!(errors = report.error_count(), "single tick finished with errors");
        }
        print!("{}", registry.render_text()?);
        return Ok(());
    }

    let cancel = CancellationToken::new();

    // Ctrl-C → graceful shutdown.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("shutdown requested");
            cancel.cancel();
        });
    }

    // A server that cannot bind takes the loop down with it.
    let server = {
        let cancel = cancel.clone();
        let port = cfg.port;
        let registry = registry.registry().clone();
        tokio::spawn(async move {
            let res = server::serve(port, registry, cancel.clone()).await;
            cancel.cancel();
            res
        })
    };

    reconciler.run(cancel.clone()).await?;
    cancel.cancel();

    server
        .await
        .map_err(|e| anyhow!("metrics server task failed: {e}"))??;
    Ok(())
}

/// Print the resolved sources without contacting the warehouse.
fn print_dry_run(cfg: &ConfigFile, fs: &dyn FileSystem, template: &QueryTemplate) {
    println!("bqexporter dry-run");
    println!("  project = {}", cfg.project.as_deref().unwrap_or("<unset>"));
    println!("  port = {}", cfg.port);
    println!("  refresh = {:?}", cfg.refresh);
    println!("  unregister_policy = {:?}", cfg.unregister_policy);
    println!();

    println!("queries ({}):", cfg.queries.len());
    for q in cfg.queries.iter() {
        println!("  - {}", q.file.display());
        println!("      metric: {}", metric_name_for(&q.file));
        println!("      kind: {}", q.kind);
        if !fs.exists(&q.file) {
            println!("      missing");
            continue;
        }
        match template.load(&q.file) {
            Ok(text) => match Schedule::resolve(q.cron.as_deref(), &text, Utc::now()) {
                Ok(schedule) => println!("      schedule: {}", schedule.expression()),
                Err(err) => println!("      schedule: error: {err}"),
            },
            Err(err) => println!("      unreadable: {err}"),
        }
    }

    debug!("dry-run complete (no queries run)");
}
