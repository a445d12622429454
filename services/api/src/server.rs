use crate::cli::ServeArgs;
use crate::demo::load_rates;
use crate::infra::{ApiClock, AppState, EngineState};
use crate::routes::with_engine_routes;
use crate::sample::sample_agency;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use homecare_engine::config::AppConfig;
use homecare_engine::error::AppError;
use homecare_engine::telemetry;
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let rates = load_rates(args.rate_sheet.as_deref())?;
    let snapshot = sample_agency(Local::now().date_naive());
    info!(
        business_id = %snapshot.business_id,
        caregivers = snapshot.caregivers.len(),
        shifts = snapshot.shifts.len(),
        rates = rates.len(),
        "seeded in-memory agency"
    );
    let engine = Arc::new(EngineState::new(
        &config.engine,
        snapshot,
        rates,
        ApiClock::System,
    ));

    let app = with_engine_routes(engine)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "home-care engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
