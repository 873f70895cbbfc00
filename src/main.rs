//! doajtally - Creative Commons license counts for DOAJ journals
//!
//! A CLI tool that walks the DOAJ journal search, classifies each journal's
//! license metadata and counts licensed journals by license, subject,
//! language and open-access start year.
//!
//! Exit codes:
//!   0   - Success (including runs cut short by a failed page request)
//!   1   - Runtime error (configuration, arguments, git, etc.)
//!   2   - Data directory is not a valid git repository
//!   3   - Data path does not exist
//!   130 - Interrupted by Ctrl-C

mod analysis;
mod cli;
mod config;
mod fetch;
mod models;
mod paths;
mod pipeline;
mod repo;
mod report;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE};
use fetch::{HttpTransport, Paginator, PaginatorConfig, TransportConfig};
use indicatif::{ProgressBar, ProgressStyle};
use paths::DataPaths;
use pipeline::{Interrupted, Pipeline};
use repo::{DataRepository, GitError, GitOptions};
use report::provenance::PROVENANCE_NOTE;
use report::{write_provenance, CountFiles, Provenance};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Name recorded in the provenance file.
const SCRIPT_NAME: &str = "doajtally";

/// Exit status after Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("doajtally v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Covers the whole run, including saving and git actions after the
    // pipeline has dropped its own shutdown listener.
    spawn_interrupt_guard(tokio::signal::ctrl_c(), || {
        eprintln!("\n(interrupted)");
        std::process::exit(EXIT_INTERRUPTED);
    });

    if let Err(e) = run(args).await {
        let code = exit_code_for(&e);
        if code == EXIT_INTERRUPTED {
            warn!("{}", e);
            eprintln!("\n(interrupted)");
        } else {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
        }
        std::process::exit(code);
    }

    Ok(())
}

/// Handle --init-config: generate a default .doajtally.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to change the API endpoint, paging, data directory, and git remote.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Call `on_interrupt` once `signal` fires, from a task that lives as long
/// as the runtime.
fn spawn_interrupt_guard<S, F>(signal: S, on_interrupt: F) -> tokio::task::JoinHandle<()>
where
    S: Future<Output = std::io::Result<()>> + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => on_interrupt(),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    })
}

/// Map a fatal error to the process exit status.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<Interrupted>().is_some() {
        EXIT_INTERRUPTED
    } else if let Some(git_err) = err.downcast_ref::<GitError>() {
        git_err.exit_code()
    } else {
        1
    }
}

/// Run the fetch, count, save and publish workflow.
async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let quarter = config
        .general
        .quarter
        .clone()
        .unwrap_or_else(paths::current_quarter);
    let paths = DataPaths::new(&config.general.repo_dir, &config.general.data_dir, quarter);
    paths.log();

    let repository = if args.enable_git {
        let repository =
            DataRepository::open(&paths.repo, GitOptions::from(&config.git))?;
        info!(
            "Syncing with {}/{}",
            config.git.remote,
            repository.branch()
        );
        repository.fetch_and_merge()?;
        Some(repository)
    } else {
        None
    };

    let count_files = CountFiles::new(&paths);
    if args.enable_save {
        count_files
            .initialize()
            .context("Failed to initialize count files")?;
    }

    // Fetch and count
    let transport = HttpTransport::new(TransportConfig::from(&config.api))?;
    let url = config.api.journals_url();
    println!("📥 Fetching journals from {}", url);
    let mut paginator = Paginator::new(&transport, url, PaginatorConfig::from(&config.api));

    let mut pipeline = Pipeline::new(args.limit);
    if !args.quiet {
        pipeline = pipeline.with_progress(spinner());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let output = pipeline.run(&mut paginator, shutdown).await?;

    if output.is_partial() {
        warn!(
            "Run ended early ({}); saving {} counted journal(s)",
            output.stop_reason, output.processed
        );
    }

    // Save results
    if args.enable_save {
        if let Err(e) = count_files.write_all(&output.tables) {
            warn!("Failed to save count files: {:#}", e);
        }
    }

    let summary = output.summary(args.limit, PROVENANCE_NOTE);
    let provenance = Provenance::new(&summary, &paths.quarter, SCRIPT_NAME);
    if let Err(e) = write_provenance(&paths.provenance_file(), &provenance, args.enable_save) {
        warn!("Failed to write provenance: {:#}", e);
    }

    println!("\n📊 License Summary:");
    for line in analysis::generate_summary_text(&output.tables).lines() {
        println!("   {}", line);
    }
    println!(
        "   Journals fetched: {} | skipped (no license): {} | pages: {}",
        output.fetched, output.skipped, output.pages
    );
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());

    // Publish
    if let Some(repository) = repository {
        let message = format!(
            "Add and commit new DOAJ CC license data for {}",
            paths.quarter
        );
        if repository.add_and_commit(&paths.data_quarter, &message)? {
            repository.push()?;
        }
    }

    println!("\n✅ Done.");
    Ok(())
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
