use account_service::{
    auth::jwt::JwtService,
    config::AppConfig,
    db,
    handlers::health,
    mail::LogMailSender,
    middleware::AppState,
    repository::PgUserStore,
    routes,
    services::AuthService,
    telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("account-service {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    if let Ok(path) = std::env::var("ACCOUNT_ENV") {
        dotenv::from_filename(format!(".env.{}", path)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&config);
    telemetry::init_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Account service starting...");

    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    if let db::HealthStatus::Unhealthy(reason) = db::health_check(&db_pool).await {
        anyhow::bail!("Database is not healthy: {}", reason);
    }

    tracing::info!("Database initialized");

    let jwt_service = Arc::new(
        JwtService::from_config(&config.security)
            .map_err(|e| anyhow::anyhow!("Failed to create JWT service: {}", e))?,
    );

    let user_store = Arc::new(PgUserStore::new(db_pool.clone()));
    let mail_sender = Arc::new(LogMailSender);

    let auth_service = Arc::new(AuthService::new(
        user_store,
        mail_sender,
        jwt_service.clone(),
        Arc::new(config.clone()),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        auth_service,
        jwt_service,
    });

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.server.addr).await?;
    tracing::info!(addr = %config.server.addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

fn print_help() {
    println!("account-service {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: account-service [选项]");
    println!();
    println!("选项:");
    println!("  --version    打印版本信息");
    println!("  --help       打印帮助信息");
    println!();
    println!("配置通过 ACCOUNT_ 前缀的环境变量加载，例如 ACCOUNT_SERVER__ADDR");
}
