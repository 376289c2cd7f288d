use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod extract;
mod gateway;
mod middleware;
mod routes;
mod state;
mod store;
mod verify;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Prism MCP Server",
        version = "0.1.0",
        description = "MCP server for gradient tweet mockups with Stytch-delegated OAuth. \
                       The MCP surface lives at POST /mcp; this doc covers the REST surface."
    ),
    paths(routes::health::health_check, routes::profile::get_profile),
    components(schemas(
        routes::health::HealthResponse,
        routes::profile::ProfileResponse,
        prism_core::error::ApiError,
        prism_core::profile::SocialProfile,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prism_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Provider configuration is validated once, here. A misconfigured
    // verifier must never reach request handling.
    let provider_config = match config::ProviderConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            tracing::error!(event = "startup_config_invalid", error = %err, "startup aborted");
            std::process::exit(1);
        }
    };

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let verifier = verify::TokenVerifier::new(provider_config.clone());
    let store = store::ProfileStore::new(pool.clone());
    let app_state = state::AppState {
        db: pool,
        gateway: gateway::Gateway::new(verifier, store),
        config: provider_config.clone(),
    };

    // CORS
    let cors_layer = middleware::cors::build_cors_layer();

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::mcp_http::router().layer(middleware::rate_limit::mcp_layer()))
        .merge(routes::profile::router().layer(middleware::rate_limit::profile_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(
        event = "startup",
        authorization_server = %provider_config.authorization_server,
        server_url = %provider_config.server_url,
        "Prism MCP server listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
