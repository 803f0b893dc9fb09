use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use super::archive::DriveGateway;
use super::intake::{read_multipart, SubmissionForm, ValidationError};
use super::service::{ScholarshipIntakeService, SUCCESS_MESSAGE};
use super::store::TabularStore;
use crate::config::CorsConfig;

pub const SUBMISSION_PATH: &str = "/api/addData";

/// Headroom for the text parts on top of three full-size documents.
const FORM_FIELDS_ALLOWANCE: usize = 1024 * 1024;

/// Router exposing the multipart submission endpoint.
pub fn intake_router<S, D>(service: Arc<ScholarshipIntakeService<S, D>>) -> Router
where
    S: TabularStore + 'static,
    D: DriveGateway + 'static,
{
    let body_limit = (service.uploads().max_file_bytes as usize)
        .saturating_mul(3)
        .saturating_add(FORM_FIELDS_ALLOWANCE);

    Router::new()
        .route(SUBMISSION_PATH, post(submit_handler::<S, D>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// CORS policy restricted to the configured origins, with credentials.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

pub(crate) async fn submit_handler<S, D>(
    State(service): State<Arc<ScholarshipIntakeService<S, D>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    S: TabularStore + 'static,
    D: DriveGateway + 'static,
{
    let mut form = SubmissionForm::new();
    let outcome = match multipart {
        Ok(mut multipart) => match read_multipart(&mut multipart, service.uploads(), &mut form).await
        {
            Ok(()) => service.submit(form).await,
            Err(err) => Err(service.reject(form, err).await),
        },
        Err(rejection) => Err(service
            .reject(form, ValidationError::Transport(rejection.body_text()))
            .await),
    };

    match outcome {
        Ok(_) => {
            let payload = json!({
                "success": true,
                "message": SUCCESS_MESSAGE,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({
                "success": false,
                "error": error.user_message(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
