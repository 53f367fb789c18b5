use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_operational_routes;
use armonia::app::{Integrations, Services};
use armonia::config::AppConfig;
use armonia::error::AppError;
use armonia::notifications::RealtimeHub;
use armonia::store::Database;
use armonia::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let database = Database::in_memory();
    let hub = Arc::new(RealtimeHub::new());
    let integrations = Integrations::in_process(hub, &config.assembly);
    let services = Services::new(&database, integrations, config.assembly.clone());

    let mut app = with_operational_routes(services.router())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    match config.tenancy.directory() {
        Some(directory) => {
            info!(tenants = directory.len(), "tenant allow-list enabled");
            app = app.layer(Extension(directory));
        }
        None => info!("accepting any well-formed tenant schema"),
    }

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "armonia backend ready");

    axum::serve(listener, app).await?;
    Ok(())
}
