use crate::cli::ServeArgs;
use crate::infra::{google_clients, AppState, InMemoryDrive, InMemoryTabularStore};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use scholarship_intake::config::{AppConfig, GoogleConfig};
use scholarship_intake::error::AppError;
use scholarship_intake::telemetry;
use scholarship_intake::workflows::scholarship::{IntakeSettings, ScholarshipIntakeService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const OFFLINE_PARENT_FOLDER: &str = "offline-root";

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    tokio::fs::create_dir_all(&config.uploads.directory).await?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let routes = if args.offline {
        warn!("offline mode: submissions are kept in memory only");
        let service = Arc::new(ScholarshipIntakeService::new(
            Arc::new(InMemoryTabularStore::default()),
            Arc::new(InMemoryDrive::default()),
            IntakeSettings {
                parent_folder_id: OFFLINE_PARENT_FOLDER.to_string(),
                uploads: config.uploads.clone(),
            },
        ));
        with_intake_routes(service, &config.cors)
    } else {
        let google = GoogleConfig::load()?;
        let (store, drive) = google_clients(&google).await?;
        info!(
            spreadsheet = %google.spreadsheet_id,
            parent_folder = %google.drive_parent_folder_id,
            "google backends configured"
        );
        let service = Arc::new(ScholarshipIntakeService::new(
            Arc::new(store),
            Arc::new(drive),
            IntakeSettings {
                parent_folder_id: google.drive_parent_folder_id.clone(),
                uploads: config.uploads.clone(),
            },
        ));
        with_intake_routes(service, &config.cors)
    };

    let app = routes
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        uploads = %config.uploads.directory.display(),
        "scholarship intake service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
