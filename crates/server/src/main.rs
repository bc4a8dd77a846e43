use std::sync::Arc;

use dispatch_api::{build_routes, AppState};
use dispatch_core::{ArbitrationEngine, Dispatcher, StateMachine};
use dispatch_geocode::NullGeocoder;
use dispatch_notify::LoggingNotifier;
use dispatch_storage::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("dispatchd server v0.1.0");
    println!("========================\n");

    let config = dispatch_core::config::load_config(std::env::var("DISPATCH_CONFIG").ok().as_deref())?;

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    let store: Arc<dyn dispatch_storage::Store> = Arc::new(store);

    let notifier = Arc::new(LoggingNotifier);

    let dispatcher = Arc::new(Dispatcher::new(store.clone(), notifier.clone(), config.clone()));
    let arbitration = Arc::new(ArbitrationEngine::new(store.clone(), notifier));
    let state_machine = Arc::new(StateMachine::new(store.clone()));

    let app_state = Arc::new(AppState {
        store,
        dispatcher,
        arbitration,
        state_machine,
        geocoder: Arc::new(NullGeocoder),
    });

    let listen_addr: std::net::SocketAddr = config.listen_addr.parse()?;
    let metrics_addr: std::net::SocketAddr = config.metrics_addr.parse()?;

    tokio::spawn(async move {
        if let Err(err) = dispatch_metrics::exporter::start_metrics_exporter(metrics_addr).await {
            tracing::error!(%err, "metrics exporter stopped");
        }
    });

    println!("listening on http://{listen_addr}");
    warp::serve(build_routes(app_state)).run(listen_addr).await;

    Ok(())
}
