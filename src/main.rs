// src/main.rs

use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ganttd::config::CONFIG;
use ganttd::db;
use ganttd::server::build_router;
use ganttd::state::create_app_state;

#[derive(Parser, Debug)]
#[command(name = "ganttd", about = "Gantt project management backend")]
struct Args {
    /// Bind host (overrides GANTTD_HOST)
    #[arg(long, env = "GANTTD_HOST")]
    host: Option<String>,

    /// Bind port (overrides GANTTD_PORT)
    #[arg(long, env = "GANTTD_PORT")]
    port: Option<u16>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = CONFIG.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting ganttd task engine");

    let database_url = args.database_url.unwrap_or_else(|| CONFIG.database_url.clone());
    let pool = db::create_optimized_pool(&database_url, CONFIG.sqlite_max_connections).await?;
    db::run_migrations(&pool).await?;

    let app_state = Arc::new(create_app_state(pool));
    let app = build_router(app_state);

    let host = args.host.unwrap_or_else(|| CONFIG.host.clone());
    let port = args.port.unwrap_or(CONFIG.port);
    let bind_address = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!("Server listening on http://{}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}
