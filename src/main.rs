use clap::Parser;
use dotenvy::dotenv;
use rust_ocr_backend::config::AppConfig;
use rust_ocr_backend::infrastructure::{staging, toolchain};
use rust_ocr_backend::{AppState, create_app};
use std::path::PathBuf;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen address, overrides WEBOCRD_HTTP_ADDR
    #[arg(short, long)]
    addr: Option<String>,

    /// Directory with front-end assets, overrides WEBOCRD_STATIC_DIR
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_ocr_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Rust OCR Backend...");

    // 2. Configuration
    let mut config = AppConfig::from_env();
    if let Some(addr) = args.addr {
        config.http_addr = addr;
    }
    if let Some(static_dir) = args.static_dir {
        config.static_dir = static_dir;
    }
    info!(
        "🛡️  Limits: Max File Size={} bytes, Max Request Size={} bytes, Read Timeout={:?}",
        config.budget.max_file_size, config.budget.max_request_size, config.read_timeout
    );

    // 3. External toolchain and staging area; both are fatal when unavailable
    let extractor = toolchain::setup_extractor().await?;
    let staging = staging::setup_staging(&config).await?;

    let state = AppState {
        config: config.clone(),
        staging,
        extractor,
    };

    // 4. HTTP tracing
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let listener = tokio::net::TcpListener::bind(config.http_addr.as_str()).await?;

    info!("✅ Server ready at http://{}", config.http_addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
