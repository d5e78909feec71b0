use std::sync::Arc;

use clap::Parser;
use minepulse::{app::App, config::read_config_file, orchestrator, ws};
use tokio::spawn;
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("minepulse", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let app = Arc::new(App::new(config).await?);
    app.load_history().await?;

    let driver = spawn(orchestrator::run(app.clone()));

    let addr = format!("{}:{}", app.config.site.host, app.config.site.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");

    // A driver error (failed persistence write) terminates the process
    tokio::select! {
        driver_result = driver => driver_result??,
        serve_result = axum::serve(listener, ws::router(app)) => serve_result?,
    }

    Ok(())
}
