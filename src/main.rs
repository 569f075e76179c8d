use clap::Parser;
use lonelog::cli::Cli;
use lonelog::orchestrator::Orchestrator;
use lonelog::{config, http, logging};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    let config = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("failed to load configuration from '{}': {e}", cli.config);
            std::process::exit(1);
        }
    };

    let http_port = config.global.http_port;

    let orchestrator = match Orchestrator::build(config) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!("failed to build pipeline: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("configuration loaded and pipeline built successfully");

    let cancel = CancellationToken::new();

    let status = orchestrator.status();
    let benchmark = orchestrator.benchmark();
    let input_names = orchestrator.input_names().to_vec();
    let filter_counters = orchestrator.filter_counters().to_vec();

    let http_cancel = cancel.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http::serve(http_port, status, benchmark, input_names, filter_counters, http_cancel).await {
            tracing::error!("http surface exited: {e}");
        }
    });

    let pipeline_cancel = cancel.clone();
    let pipeline_handle = tokio::spawn(orchestrator.run(pipeline_cancel));

    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal");
        shutdown_cancel.cancel();
    });

    let _ = tokio::join!(http_handle, pipeline_handle);
    tracing::info!("lonelog exiting");
}
