mod config;
mod db;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to load .env: {e}");
        }
    }
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();

    let pool = match &config.database_url {
        Some(url) => match db::init_pool(url, config.db_max_connections).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::error!(error = %e, "database init failed");
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set; boards are kept in memory only");
            None
        }
    };

    let port = config.port;
    let state = state::AppState::new(pool, config);
    let app = routes::app(state);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%port, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(%port, "inkboard relay listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server failed");
    }
}
