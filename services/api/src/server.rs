use crate::cli::ServeArgs;
use crate::demo::seed_demo_dataset;
use crate::infra::{build_suggester, AppState};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use lern::artifacts::MemoryBlobStore;
use lern::config::AppConfig;
use lern::error::AppError;
use lern::store::MemoryStore;
use lern::telemetry;
use lern::LernService;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = MemoryStore::new();
    if args.seed_demo {
        seed_demo_dataset(&store, &config.context, None)?;
    }

    let service = Arc::new(LernService::new(
        Arc::new(store),
        Arc::new(MemoryBlobStore::default()),
        build_suggester(&config.suggestions),
        config.context.clone(),
    ));

    let app = with_operational_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        org_id = %config.context.org_id,
        seeded = args.seed_demo,
        "LERN service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
