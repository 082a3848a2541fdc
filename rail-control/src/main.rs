use std::sync::Arc;

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use rail_control::config::ServerConfig;
use rail_control::handoff::MotionOutbox;
use rail_control::service::RailService;
use rail_control::topology::{LayoutDirectory, Network, NetworkTopology};
use rail_control::web::{AppState, SessionHub, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rail_control=info")),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    // Load the network (fail fast if unavailable)
    let network = Network::load(&config.network_path)?;
    info!(
        stations = network.stations().len(),
        sections = network.sections().len(),
        path = %config.network_path.display(),
        "loaded network"
    );
    let layouts = Arc::new(LayoutDirectory::new(&config.layout_dir));
    let topology = Arc::new(NetworkTopology::new(network, layouts));

    let hub = Arc::new(SessionHub::new());
    let motion = Arc::new(MotionOutbox::with_capacity(config.motion_outbox_capacity));
    let (service, rx) = RailService::new(topology, hub.clone(), motion.clone(), config.approval());
    let service = Arc::new(service);

    // Deliver notifications in commit order
    tokio::spawn(service.dispatcher().clone().run(rx));

    // Deny approvals nobody answered in time
    let sweeper = service.clone();
    let sweep_interval = config.sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            interval.tick().await;
            let expired = sweeper.expire_overdue();
            if !expired.is_empty() {
                debug!(count = expired.len(), "expired overdue approvals");
            }
        }
    });

    let state = AppState::new(service, hub, motion);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "rail control listening");
    info!("  GET  /ws                          - controller socket");
    info!("  GET  /api/stations                - stations in display order");
    info!("  POST /api/trains/:number/entry    - request section entry");
    info!("  POST /api/motion/poll             - collect motion commands");

    axum::serve(listener, app).await?;
    Ok(())
}
