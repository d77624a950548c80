use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use gallery_engine::api::logging::init_tracing;
use gallery_engine::engine::benchmark::{BenchmarkOutcome, ProgressUpdate};
use gallery_engine::{EngineConfig, GalleryEngine};

#[derive(Parser, Debug)]
#[command(
    name = "gallery-engine",
    version = env!("CARGO_PKG_VERSION"),
    about = "Fetch gallery images through an expiring disk cache and benchmark dispatchers",
    long_about = None
)]
struct Cli {
    /// Cache directory (defaults to a folder under the system temp dir)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Base URL image ids are appended to
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Time uncached downloads of images 1..=COUNT under every dispatcher config
    Bench {
        #[arg(long, short = 'n')]
        count: usize,
    },
    /// Resolve images by id through the cache
    Fetch {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Delete every cached entry
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = format!("{},hyper=warn,reqwest=warn", cli.log_level);
    init_tracing(Some(&filter));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = EngineConfig::default();
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    let engine = GalleryEngine::new(config)?;

    match cli.command {
        Commands::Bench { count } => bench(&engine, count).await,
        Commands::Fetch { ids } => fetch(&engine, &ids).await,
        Commands::Clear => {
            engine.refresh().await?;
            println!("cache cleared at {}", engine.cache().root().display());
            Ok(())
        }
    }
}

async fn bench(engine: &GalleryEngine, count: usize) -> Result<()> {
    let locators = engine.benchmark_locators(count)?;

    // Progress is rendered by this task, not by the benchmark's workers.
    let (tx, mut rx) = mpsc::channel::<ProgressUpdate>(16);
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            match update {
                ProgressUpdate::Status(message) => println!("{}", message),
                ProgressUpdate::Advanced { completed, total } => {
                    println!("[{}/{}]", completed, total)
                }
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling benchmark");
                cancel.cancel();
            }
        })
    };

    let outcome = engine.run_benchmark(&locators, &tx, &cancel).await;
    drop(tx);
    let _ = printer.await;
    ctrl_c.abort();

    let outcome = outcome?;
    for sample in outcome.samples() {
        println!("{:<12} {:>8} ms", sample.label, sample.elapsed_ms);
    }
    if let BenchmarkOutcome::Cancelled { .. } = outcome {
        println!("benchmark cancelled");
    }
    Ok(())
}

async fn fetch(engine: &GalleryEngine, ids: &[u64]) -> Result<()> {
    for &id in ids {
        let locator = engine.locator_for_id(id)?;
        match engine.resolve(&locator).await {
            Some(image) => println!("{} {}x{}", locator, image.width(), image.height()),
            None => println!("{} unavailable", locator),
        }
    }

    let stats = engine.stats();
    info!(
        "cache hits={} misses={} writes={} downloaded={} bytes",
        stats.cache_hits, stats.cache_misses, stats.cache_writes, stats.downloaded_bytes
    );
    Ok(())
}
