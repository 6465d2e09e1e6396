use crate::cli::ServeArgs;
use crate::infra::{cors_middleware, AppState, CorsPolicy};
use crate::routes::with_lead_routes;
use axum::middleware::from_fn_with_state;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lead_relay::config::AppConfig;
use lead_relay::error::AppError;
use lead_relay::telemetry;
use lead_relay::workflows::leads::{CsvLeadStore, HttpPartnerClient, LeadCaptureService};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(leads_file) = args.leads_file.take() {
        config.store.leads_file = leads_file;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(CsvLeadStore::open(&config.store.leads_file)?);
    let partner = match &config.partner {
        Some(partner_config) => {
            let client = HttpPartnerClient::new(partner_config)?;
            info!(endpoint = %client.endpoint(), "partner forwarding enabled");
            Some(Arc::new(client))
        }
        None => {
            warn!("PARTNER_API_URL not set; leads will only be stored");
            None
        }
    };
    let capture_service = Arc::new(LeadCaptureService::new(store, partner));
    let cors = Arc::new(CorsPolicy::new(config.server.cors_allowed_origins.clone()));

    let app = with_lead_routes(capture_service)
        .layer(from_fn_with_state(cors, cors_middleware))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        leads_file = %config.store.leads_file.display(),
        "lead relay ready"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
