mod settings;

use std::sync::Arc;
use std::time::Duration;

use tarifsync_core::common::time::{RealTimeProvider, TimeProvider};
use tarifsync_core::config::LogConfig;
use tarifsync_feed::energidata::EnergiDataProvider;
use tarifsync_reconcile::{SyncPass, SyncPorts};
use tarifsync_store::DownstreamApi;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// # Summary
/// Entry point. Wires the concrete adapters into a `SyncPass` and runs it.
///
/// # Logic
/// 1. Load `.env`, then the configuration.
/// 2. Initialize logging.
/// 3. Build the downstream and upstream adapters.
/// 4. Run one pass, or one pass per `schedule.interval_secs` until Ctrl-C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = settings::load("tarifsync")?;
    let _log_guard = init_tracing(&config.log);
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();
    info!("tarifsync starting against {}", config.api.base_url);

    let clock: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);
    let downstream = Arc::new(DownstreamApi::new(&config.api)?);
    let upstream = Arc::new(EnergiDataProvider::new(&config.upstream, clock.clone())?);

    let pass = SyncPass::new(
        SyncPorts {
            auth: downstream.clone(),
            watermarks: downstream.clone(),
            owners: downstream.clone(),
            source: upstream,
            sink: downstream,
            clock,
        },
        config.sync.clone(),
    );

    let Some(interval_secs) = config.schedule.interval_secs else {
        pass.run().await?;
        return Ok(());
    };

    info!("Running a sync pass every {}s", interval_secs);
    let pass = &pass;
    run_scheduled(
        Duration::from_secs(interval_secs.max(1)),
        move || async move {
            if let Err(e) = pass.run().await {
                error!("Sync pass failed: {}", e);
            }
        },
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        },
    )
    .await;

    Ok(())
}

/// # Summary
/// Runs `sync` once per `period` until `shutdown` resolves.
///
/// # Invariants
/// - One `shutdown` future lives across all passes, so a signal raised while
///   a pass runs drops that pass at its next await point and ends the loop.
/// - Passes never overlap; a late tick is delayed, not bunched.
async fn run_scheduled<F, Fut, S>(period: Duration, mut sync: F, shutdown: S)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::select! {
                    _ = sync() => {}
                    _ = &mut shutdown => {
                        info!("Shutdown signal received during a sync pass. Exiting...");
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received. Exiting...");
                break;
            }
        }
    }
}

/// # Summary
/// Console logging, plus a daily rolling file when `log.dir` is set.
///
/// # Returns
/// The file writer's guard; dropping it flushes and stops file logging.
fn init_tracing(log: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));

    let (file_layer, guard) = match &log.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tarifsync.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    guard
}
