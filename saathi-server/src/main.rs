use std::sync::Arc;

use clap::Parser;
use saathi_core::{
    ActivitySink, ApiKey, Generator, MemoryActivityLog, PgActivityLog, SaathiConfig,
    WorksheetEvaluator,
};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use saathi_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "saathi.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match SaathiConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let api_key = ApiKey::parse(config.gemini.api_key_from_env().as_deref());

    if args.health {
        return health(&config, api_key.as_ref()).await;
    }

    match &api_key {
        Some(key) => tracing::info!(key = %key.masked(), model = %config.gemini.model, "Gemini API key loaded"),
        None => tracing::warn!(env = %config.gemini.api_key_env, "Gemini API key missing or invalid"),
    }

    let activities: Arc<dyn ActivitySink> = if config.database.url.is_empty() {
        tracing::warn!("No database configured, activities are kept in memory");
        Arc::new(MemoryActivityLog::new())
    } else {
        // Lazy: agents keep serving while Postgres is down
        let pool = saathi_core::db::create_lazy_pool(&config.database)?;
        Arc::new(PgActivityLog::new(pool))
    };

    let state = Arc::new(HttpState {
        generator: Generator::from_config(&config.gemini),
        activities,
        evaluator: WorksheetEvaluator::from_config(&config.evaluation),
    });

    let (tx, rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, &config.http, rx).await?;

    Ok(())
}

async fn health(config: &SaathiConfig, api_key: Option<&ApiKey>) -> anyhow::Result<()> {
    let mut healthy = true;

    match api_key {
        Some(key) => println!("✅ Gemini API key: {}", key.masked()),
        None => println!(
            "⚠️  Gemini API key missing or invalid ({}), agents will serve demo content",
            config.gemini.api_key_env
        ),
    }

    if config.database.url.is_empty() {
        println!("⚠️  No database configured, activities are kept in memory");
    } else {
        match saathi_core::db::create_pool(&config.database).await {
            Ok(pool) => match saathi_core::db::health_check(&pool).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL query failed: {}", e);
                    healthy = false;
                }
            },
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                healthy = false;
            }
        }
    }

    println!("ℹ️  Evaluator: {} (timeout {}s)", config.evaluation.program, config.evaluation.timeout_seconds);

    if !healthy {
        std::process::exit(1);
    }
    println!("✅ Saathi health check passed");
    Ok(())
}
