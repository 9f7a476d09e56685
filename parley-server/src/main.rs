use clap::Parser;
use parley_core::{HttpAiResponder, HttpMessageBus, ParleyConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use parley_server::store::PgStore;
use parley_server::subsystems::fallback::FallbackScheduler;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "parley.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match ParleyConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match parley_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match parley_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Parley DB health check passed");
        return Ok(());
    }

    let store = Arc::new(PgStore::new(pool.clone()));
    let bus = Arc::new(HttpMessageBus::new(&config.bus)?);
    let ai = Arc::new(HttpAiResponder::new(&config.ai)?);

    let mut scheduler = FallbackScheduler::new(
        store,
        bus,
        ai,
        Duration::from_secs(config.fallback.interval_seconds),
    );
    scheduler.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    scheduler.stop().await;
    pool.close().await;

    Ok(())
}
