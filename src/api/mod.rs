//! HTTP surface: route table and OpenAPI document.

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{self, AppState};
use crate::models::{CreateIntegrationRequest, IntegrationResponse, UpdateIntegrationRequest};

/// Request size limit: 1MB max payload
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::find_all,
        handlers::find_by_id,
        handlers::find_by_identity_dni,
        handlers::create,
        handlers::update,
        handlers::delete,
    ),
    components(schemas(CreateIntegrationRequest, UpdateIntegrationRequest, IntegrationResponse)),
    tags(
        (name = "bank", description = "Bank account integration records"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Routes under `/v1/bank`, without state.
fn bank_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/bank/findAll", get(handlers::find_all))
        .route("/v1/bank/findById/:id", get(handlers::find_by_id))
        .route(
            "/v1/bank/findByIdentityDni/:dni",
            get(handlers::find_by_identity_dni),
        )
        .route("/v1/bank", post(handlers::create))
        .route("/v1/bank/", post(handlers::create))
        .route("/v1/bank/:id", put(handlers::update).delete(handlers::delete))
}

/// Builds the application router.
///
/// With `rate_limited` the business routes get a per-IP rate limit (10 req/sec,
/// burst of 20); `/health` and the documentation are never limited. The
/// rate limiter needs the peer address, so serve the router with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(state: Arc<AppState>, rate_limited: bool) -> anyhow::Result<Router> {
    let mut api = bank_routes().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    if rate_limited {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(10)
                .burst_size(20)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
        );
        api = api.layer(ServiceBuilder::new().layer(GovernorLayer {
            config: governor_conf,
        }));
    }

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            // One info event per request with its status and latency
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(CorsLayer::permissive()))
}
