use std::{net::SocketAddr, sync::Arc};

use {
    anyhow::Context,
    axum::{
        Json, Router,
        extract::{DefaultBodyLimit, State},
        http::{HeaderValue, Method, StatusCode, header},
        middleware,
        response::IntoResponse,
        routing::{get, post},
    },
    chrono::SecondsFormat,
    hugli_channels::ChannelHealthSnapshot,
    hugli_config::HugliConfig,
    hugli_whatsapp::{DeliveryGateway, EvolutionFactory, SessionConfig, SessionManager},
    serde_json::json,
    tower_http::{
        cors::{AllowOrigin, Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{error, info, warn},
};

use crate::{ip_filter, state::AppState, store::SqliteStore, submissions, whatsapp};

const BODY_LIMIT: usize = 10 * 1024 * 1024;

pub(crate) fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origin.trim() == "*" {
        return cors.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origin
        .split(',')
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Build the router (shared between production startup and tests).
pub fn build_app(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/contact", post(submissions::submit_contact))
        .route("/api/orders", post(submissions::submit_order))
        .route("/api/products", get(products_handler))
        .route("/api/whatsapp/qr", get(whatsapp::qr_code))
        .route("/api/whatsapp/status", get(whatsapp::status))
        .route("/api/whatsapp/restart", post(whatsapp::restart))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            ip_filter::restrict_ip,
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the database, start the WhatsApp session and serve until ctrl-c.
pub async fn start_server(config: HugliConfig) -> anyhow::Result<()> {
    let db_url = match &config.database.url {
        Some(url) => url.clone(),
        None => format!(
            "sqlite://{}",
            hugli_config::data_dir().join("hugli.db").display()
        ),
    };
    if let Some(parent) = db_url
        .strip_prefix("sqlite://")
        .and_then(|p| std::path::Path::new(p).parent())
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {}", parent.display()))?;
    }
    let store = SqliteStore::connect(&db_url)
        .await
        .with_context(|| format!("failed to open database {db_url}"))?;

    let factory = EvolutionFactory::new(&config.whatsapp.bridge)
        .context("failed to build WhatsApp bridge client")?;
    let session = SessionManager::spawn(SessionConfig::from(&config.whatsapp), Arc::new(factory));
    let state = AppState::new(
        Arc::new(store),
        DeliveryGateway::new(session.clone()),
        config.ip_restriction.clone(),
    );
    let version = state.version;
    let app = build_app(state, &config.server.cors_origin);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let lines = [
        format!("hugli v{version}, listening on {addr}"),
        format!("database: {db_url}"),
        format!(
            "whatsapp bridge: {} (instance {})",
            config.whatsapp.bridge.base_url, config.whatsapp.bridge.instance
        ),
        format!(
            "ip restriction: {}",
            if config.ip_restriction.enabled {
                config.ip_restriction.allowed_ips.join(", ")
            } else {
                "disabled".into()
            }
        ),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    session.initialize();
    info!("WhatsApp service initialization started; poll /api/whatsapp/status or /api/whatsapp/qr");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Err(e) = session.shutdown().await {
        warn!(error = %e, "WhatsApp session did not shut down cleanly");
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session().snapshot_status();
    let whatsapp = ChannelHealthSnapshot {
        channel: "whatsapp".into(),
        connected: session.is_ready(),
        details: Some(session.state.to_string()),
    };

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "message": "Hugli Printing Press API is running",
                "timestamp": iso_timestamp(),
                "status": "healthy",
                "version": state.version,
                "database": { "connected": true, "version": "Connected" },
                "whatsapp": whatsapp,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "message": "API is running but database connection failed",
                "timestamp": iso_timestamp(),
                "status": "unhealthy",
                "version": state.version,
                "database": { "connected": false, "error": e.to_string() },
                "whatsapp": whatsapp,
            })),
        ),
    }
}

async fn products_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_products().await {
        Ok(products) => (StatusCode::OK, Json(json!(products))),
        Err(e) => {
            error!(error = %e, "products fetch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Error fetching products" })),
            )
        },
    }
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}
