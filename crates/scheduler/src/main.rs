use std::sync::Arc;

use dispatch_core::{Dispatcher, ReconciliationLoop};
use dispatch_notify::LoggingNotifier;
use dispatch_storage::PgStore;
use tokio::time::{interval, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("dispatchd scheduler v0.1.0");
    println!("===========================\n");

    let config = dispatch_core::config::load_config(std::env::var("DISPATCH_CONFIG").ok().as_deref())?;

    let store = PgStore::connect(&config.database_url).await?;
    let store: Arc<dyn dispatch_storage::Store> = Arc::new(store);

    let notifier = Arc::new(LoggingNotifier);
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), notifier.clone(), config.clone()));
    let reconciliation = Arc::new(ReconciliationLoop::new(store, dispatcher, notifier));

    let fast_reconciliation = reconciliation.clone();
    let fast_interval_secs = config.reconciliation_interval_secs;
    let fast_sweeps = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(fast_interval_secs));
        loop {
            ticker.tick().await;
            if let Err(err) = fast_reconciliation.run_fast_sweeps().await {
                tracing::warn!(%err, "fast reconciliation tick failed, will retry next tick");
            }
        }
    });

    let scheduled_interval_secs = config.scheduled_sweep_interval_secs;
    let scheduled_sweep = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(scheduled_interval_secs));
        loop {
            ticker.tick().await;
            if let Err(err) = reconciliation.run_scheduled_sweep().await {
                tracing::warn!(%err, "scheduled sweep tick failed, will retry next tick");
            }
        }
    });

    println!(
        "sweeping every {}s (fast) / {}s (scheduled)",
        fast_interval_secs, scheduled_interval_secs
    );

    let _ = tokio::join!(fast_sweeps, scheduled_sweep);
    Ok(())
}
