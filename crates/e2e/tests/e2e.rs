//! E2E harness entry point
//!
//! Runs the YAML suites against the live sites through Playwright, or
//! against the simulated sites with `--simulate`.
//! Run with: cargo test --package shopflow-e2e --test e2e -- [ARGS]

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shopflow_e2e::playwright::{Browser, PlaywrightHandle};
use shopflow_e2e::preflight::wait_for_reachable;
use shopflow_e2e::{
    Driver, E2eError, E2eResult, RunConfig, ScenarioFilter, SimulatedSite, Site, SuiteRunner,
    SuiteSpec,
};

#[derive(Parser, Debug, Default)]
#[command(name = "shopflow-e2e")]
#[command(about = "Declarative browser-workflow runner")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of suite YAML files
    #[arg(short, long)]
    scenarios: Option<PathBuf>,

    /// Run only scenarios matching this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the scenario (or suite) with this name
    #[arg(short, long)]
    name: Option<String>,

    /// Drive the in-memory simulated sites instead of a browser
    #[arg(long)]
    simulate: bool,

    /// Fail instead of skipping when Playwright or the sites are unavailable
    #[arg(long)]
    require_browser: bool,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Wait window for expectations, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    storefront_url: Option<String>,

    #[arg(long)]
    finance_url: Option<String>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// `cargo test` forwards its own flags to harness-less targets; anything we
/// do not understand means "run with defaults".
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            e.exit()
        }
        Err(e) => {
            eprintln!("ignoring arguments: {}", e.kind());
            Args::default()
        }
    }
}

fn main() {
    let args = parse_args();

    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn build_config(args: &Args) -> E2eResult<RunConfig> {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| manifest_dir.join("shopflow.toml"));

    let mut config = RunConfig::load(&config_path)?;
    config.apply_env()?;

    if let Some(url) = &args.storefront_url {
        config.storefront.base_url = url.clone();
    }
    if let Some(url) = &args.finance_url {
        config.finance.base_url = url.clone();
    }
    if let Some(browser) = &args.browser {
        config.browser.kind = Browser::from_str(browser)?;
    }
    if args.headed {
        config.browser.headless = false;
    }
    if let Some(ms) = args.timeout_ms {
        config.browser.default_timeout_ms = ms;
    }
    if let Some(dir) = &args.scenarios {
        config.paths.scenarios_dir = dir.clone();
    }
    if let Some(dir) = &args.output {
        config.paths.output_dir = dir.clone();
    }

    config.anchor_paths(manifest_dir);
    config.validate()?;
    Ok(config)
}

/// Ok(None) means the run should be skipped
async fn live_driver(
    config: &RunConfig,
    suites: &[SuiteSpec],
    require: bool,
) -> E2eResult<Option<Box<dyn Driver>>> {
    if let Err(e) = PlaywrightHandle::check_playwright_installed() {
        if require {
            return Err(e);
        }
        warn!("Skipping live run: {}", e);
        return Ok(None);
    }

    let mut sites: Vec<Site> = suites.iter().map(|s| s.site).collect();
    sites.sort_by_key(|s| *s as u8);
    sites.dedup();
    for site in sites {
        let url = format!("{}/", config.base_url(site));
        match wait_for_reachable(&url, Duration::from_secs(15)).await {
            Ok(()) => {}
            Err(e @ E2eError::Unreachable { .. }) if !require => {
                warn!("Skipping live run: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }

    let handle = PlaywrightHandle::launch(config.playwright()).await?;
    Ok(Some(Box::new(handle)))
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let config = build_config(&args)?;
    let suites = SuiteSpec::load_all(&config.paths.scenarios_dir)?;
    info!(
        "Loaded {} suite(s) from {}",
        suites.len(),
        config.paths.scenarios_dir.display()
    );

    let driver: Box<dyn Driver> = if args.simulate {
        Box::new(SimulatedSite::from_config(&config, config.selector_catalog()?))
    } else {
        match live_driver(&config, &suites, args.require_browser).await? {
            Some(driver) => driver,
            None => return Ok(true),
        }
    };

    let filter = ScenarioFilter {
        tag: args.tag.clone(),
        name: args.name.clone(),
    };
    let runner = SuiteRunner::new(config, driver)?.with_filter(filter);

    let summary = runner.run_suites(&suites).await;
    runner.write_results(&summary)?;

    if let Err(e) = runner.shutdown().await {
        warn!("Driver shutdown failed: {}", e);
    }

    Ok(summary.success())
}
