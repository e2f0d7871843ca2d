use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crpt_api::api::{ApiResponse, DryRunTransport, Transport};
use crpt_api::{ClientConfig, CrptApi, Document, RateLimiter, Result, SubmissionPipeline};

/// Submit sample documents concurrently through the rate-limited client.
#[derive(Parser, Debug)]
#[command(name = "crpt-api", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent submissions to start
    #[arg(short = 'n', long, default_value_t = 10)]
    requests: usize,

    /// Value sent in the Signature header
    #[arg(short, long, default_value = "test")]
    signature: String,

    /// Do not contact the API; acknowledge every request locally
    #[arg(long)]
    dry_run: bool,

    /// Simulated response latency for --dry-run, in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!("Starting CRPT API demo");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::load(args.config.as_deref())?;
    info!(
        url = %config.api.create_document_url(),
        request_limit = config.rate_limit.request_limit,
        time_unit = ?config.rate_limit.time_unit,
        "Configuration loaded"
    );

    if args.dry_run {
        let transport = DryRunTransport::new(Duration::from_millis(args.latency_ms));
        let api = SubmissionPipeline::with_transport(&config, transport)?;
        run(Arc::new(api), &args).await
    } else {
        let api = CrptApi::from_config(&config)?;
        run(Arc::new(api), &args).await
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Spawn all submissions at once and wait for them, or for Ctrl+C.
async fn run<T>(api: Arc<SubmissionPipeline<RateLimiter, T>>, args: &Args) -> anyhow::Result<()>
where
    T: Transport + 'static,
{
    let document = Arc::new(Document::sample());
    let start = Instant::now();
    let mut submissions = JoinSet::new();

    for number in 1..=args.requests {
        let api = api.clone();
        let document = document.clone();
        let signature = args.signature.clone();

        submissions.spawn(async move {
            info!(
                request = number,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Sending request"
            );
            let result = api.create_document(&document, &signature).await;
            info!(
                request = number,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request finished"
            );
            (number, result)
        });
    }

    let failed = tokio::select! {
        failed = drain(&mut submissions) => Some(failed),
        _ = shutdown_signal() => None,
    };

    submissions.abort_all();
    api.shutdown().await;

    match failed {
        Some(0) => {
            info!(
                requests = args.requests,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "All submissions completed"
            );
            Ok(())
        }
        Some(failed) => anyhow::bail!("{} of {} submissions failed", failed, args.requests),
        None => {
            warn!("Interrupted before all submissions completed");
            Ok(())
        }
    }
}

/// Wait for every submission and count the ones that returned an error.
async fn drain(submissions: &mut JoinSet<(usize, Result<ApiResponse>)>) -> usize {
    let mut failed = 0;

    while let Some(joined) = submissions.join_next().await {
        match joined {
            Ok((_, Ok(_))) => {}
            Ok((number, Err(e))) => {
                error!(request = number, error = %e, "Submission failed");
                failed += 1;
            }
            Err(e) => {
                error!(error = %e, "Submission task panicked");
                failed += 1;
            }
        }
    }

    failed
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping");
        }
    }
}
