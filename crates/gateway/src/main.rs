//! VeriNews API Gateway
//!
//! The HTTP entry point of the service.
//! Handles:
//! - Authentication and authorization
//! - Rate limiting on the public classify and one-time code routes
//! - Request routing
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

#[cfg(test)]
mod tests;

use anyhow::Context;
use axum::{
    extract::FromRef,
    http::{HeaderValue, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use verinews_common::{
    auth::{Authenticator, JwtManager},
    classifier::{create_classifier, Classifier},
    config::{AppConfig, ObservabilityConfig, ServerConfig},
    db::{DbPool, Repository},
    metrics,
    otp::{LogDelivery, OtpService, RedisOtpStore},
    store::Store,
};

use middleware::rate_limit::{create_rate_limiter, GlobalRateLimiter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub authenticator: Authenticator,
    pub classifier: Arc<dyn Classifier>,
    pub otp: OtpService,
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
    pub otp_rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    let config = Arc::new(config);

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting VeriNews API Gateway v{}",
        verinews_common::VERSION
    );

    // Initialize metrics
    init_metrics(&config.observability)?;

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        db.ensure_schema().await?;
    }
    let store: Arc<dyn Store> = Arc::new(Repository::new(db));

    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .context("auth.jwt_secret must be set")?;
    let jwt = Arc::new(JwtManager::new(secret, config.auth.jwt_expiration_secs));

    let classifier = create_classifier(&config.classifier)?;
    info!(provider = classifier.provider(), url = %config.classifier.url, "Classifier ready");

    info!("Connecting to Redis...");
    let codes = RedisOtpStore::new(&config.redis).await?;
    let otp = OtpService::new(Arc::new(codes), Arc::new(LogDelivery), config.otp_ttl());

    // Create app state
    let state = AppState {
        config: config.clone(),
        authenticator: Authenticator::new(jwt, store.clone()),
        store,
        classifier,
        otp,
        rate_limiter: create_rate_limiter(&config.rate_limit),
        otp_rate_limiter: create_rate_limiter(&config.rate_limit),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logging {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!(
                "{}_classification_duration_seconds",
                metrics::METRICS_PREFIX
            )),
            metrics::CLASSIFICATION_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    metrics::register_metrics();
    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();
    let server = &config.server;

    // Public routes are rate limited, each group with its own bucket
    let classify = match state.rate_limiter.clone() {
        Some(limiter) => post(handlers::classify::classify)
            .layer(from_fn_with_state(limiter, middleware::rate_limit::rate_limit)),
        None => post(handlers::classify::classify),
    };

    let news_routes = Router::new()
        .route("/classify", classify)
        .route("/save", post(handlers::news::save_news))
        .route("/admin/list", get(handlers::news::list_news))
        .route("/admin/suggestions", get(handlers::news::suggestions))
        .route("/history/{user_id}", get(handlers::news::history))
        .route(
            "/{id}",
            get(handlers::news::get_news)
                .put(handlers::news::update_news)
                .delete(handlers::news::delete_news),
        );

    let report_routes = Router::new()
        .route("/submit", post(handlers::reports::submit_report))
        .route("/admin/pending/{news_id}", get(handlers::reports::pending_reports))
        .route(
            "/admin/status/{report_id}",
            put(handlers::reports::update_report_status),
        )
        .route("/admin/for-news/{news_id}", get(handlers::reports::report_for_news));

    let user_routes = Router::new()
        .route("/admin/list", get(handlers::users::list_users))
        .route("/admin/add", post(handlers::users::add_user))
        .route("/admin/update/{user_id}", put(handlers::users::update_user))
        .route("/admin/delete/{user_id}", delete(handlers::users::delete_user))
        .route("/admin/suggestions", get(handlers::users::suggestions));

    let mut otp_routes = Router::new()
        .route("/send", post(handlers::otp::send_code))
        .route("/verify", post(handlers::otp::verify_code));
    if let Some(limiter) = state.otp_rate_limiter.clone() {
        otp_routes =
            otp_routes.route_layer(from_fn_with_state(limiter, middleware::rate_limit::rate_limit));
    }

    let api_routes = Router::new()
        .nest("/news", news_routes)
        .nest("/reports", report_routes)
        .nest("/users", user_routes)
        .nest("/otp", otp_routes);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(from_fn(middleware::metrics::track_metrics))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(GlobalConcurrencyLimitLayer::new(server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(server))
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match server.cors_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => cors.allow_origin(AllowOrigin::exact(origin)),
        Some(Err(_)) => {
            warn!("Invalid server.cors_origin, allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
