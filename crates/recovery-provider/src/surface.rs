//! Axum surface for the account provider's well-known endpoints.

use std::sync::Arc;

use axum::extract::{Form, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use recovery_config::{AccountProviderConfiguration, CONFIG_PATH, TOKEN_STATUS_PATH};

use crate::record::TokenRecordStore;
use crate::status::{apply_token_status, TokenStatus};

struct SurfaceState {
    /// Serialized once at construction; the configuration is immutable.
    config_json: String,
    config_max_age_secs: u64,
    store: Arc<dyn TokenRecordStore>,
}

/// The account provider's well-known HTTP surface.
///
/// Serves the configuration document and receives token-status callbacks.
/// Every response carries HSTS and `X-Frame-Options: DENY`; everything
/// except the cacheable configuration endpoint is `no-store`.
pub struct ProviderSurface {
    state: Arc<SurfaceState>,
}

impl ProviderSurface {
    pub fn new(
        config: &AccountProviderConfiguration,
        config_max_age_secs: u64,
        store: Arc<dyn TokenRecordStore>,
    ) -> Self {
        Self {
            state: Arc::new(SurfaceState {
                config_json: config.to_json().to_string(),
                config_max_age_secs,
                store,
            }),
        }
    }

    /// Router for the two well-known endpoints, ready to merge into the
    /// host application's router.
    pub fn router(&self) -> Router {
        Router::new()
            .route(CONFIG_PATH, get(serve_configuration))
            .route(TOKEN_STATUS_PATH, post(receive_token_status))
            .layer(middleware::from_fn(security_headers))
            .with_state(Arc::clone(&self.state))
    }
}

async fn serve_configuration(State(state): State<Arc<SurfaceState>>) -> Response {
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_str(&format!("max-age={}", state.config_max_age_secs))
                    .unwrap_or_else(|_| HeaderValue::from_static("max-age=0")),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ),
        ],
        state.config_json.clone(),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct TokenStatusForm {
    id: String,
    status: String,
}

/// Token lifecycle callback from a recovery provider.
///
/// Always replies 200 with an empty body, including for unknown ids,
/// unknown statuses, and unparsable forms, so the endpoint cannot be used
/// to enumerate issued tokens.
async fn receive_token_status(
    State(state): State<Arc<SurfaceState>>,
    form: Option<Form<TokenStatusForm>>,
) -> StatusCode {
    if let Some(Form(form)) = form {
        match TokenStatus::parse(&form.status) {
            Some(status) => apply_token_status(state.store.as_ref(), &form.id, status),
            None => tracing::debug!(status = %form.status, "ignoring unknown token status"),
        }
    }
    StatusCode::OK
}

async fn security_headers(request: Request, next: Next) -> Response {
    let cacheable = request.uri().path() == CONFIG_PATH;
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=3600000; includeSubDomains"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    if !cacheable {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, must-revalidate"),
        );
    }
    response
}
