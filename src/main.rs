use anyhow::Result;
use axum::http::HeaderValue;
use cropwise_api::clients::{DiseaseClient, ImageHostClient, WeatherClient};
use cropwise_api::db::{configure_connection, establish_pool, run_migrations};
use cropwise_api::routes::{router, AppState};
use cropwise_api::settings::settings;
use cropwise_api::utils::{
    log_db_ready, log_db_status, log_server_starting, log_startup_config,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::subscriber::set_global_default;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("cropwise_api=info".parse()?))
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        );
    set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "cropwise.db".to_string());
    let jwt_secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "dev-secret-change-me".to_string());
    let weather_api_key = std::env::var("WEATHER_API_KEY").unwrap_or_default();

    log_startup_config(&database_url, port);

    log_db_status("Initializing SQLite connection pool...");
    let pool = establish_pool(&database_url);
    {
        let mut conn = pool.get().expect("Failed to get initial connection");
        configure_connection(&mut conn).expect("Failed to configure SQLite connection");
        run_migrations(&mut conn).expect("Failed to run migrations");
    }
    log_db_ready();

    let state = AppState {
        pool,
        jwt_secret,
        weather: WeatherClient::new(weather_api_key),
        disease: DiseaseClient::new(),
        images: ImageHostClient::new(),
    };

    let cors_origin = &settings().server.cors_origin;
    let cors = if cors_origin == "*" {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::exact(
                cors_origin
                    .parse::<HeaderValue>()
                    .expect("Invalid cors_origin in settings"),
            ))
            .allow_methods(AllowMethods::any())
            .allow_headers(AllowHeaders::any())
    };

    let app = router(state).layer(cors);

    log_server_starting(port);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
