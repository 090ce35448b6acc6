use agentic_rpa::{Agent, AgentOptions, Brain, ChromeDriver, Config, LaunchSettings, OpenAiClient};
use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "agent")]
#[command(author, version, about = "Execute a natural-language task in a real browser")]
struct Cli {
    /// What to do, e.g. "create a project called Alpha in Linear"
    #[arg(long)]
    task: String,

    /// Page to open before logging in
    #[arg(long)]
    url: Option<String>,

    /// Where screenshots, step metadata, cookies and the report go
    #[arg(long, default_value = "output")]
    outdir: PathBuf,

    /// JSON config file; missing means defaults
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    std::fs::create_dir_all(&cli.outdir)
        .with_context(|| format!("Failed to create {}", cli.outdir.display()))?;

    let api_key = config.planner.require_api_key()?;
    let client = OpenAiClient::new(&config.planner, api_key).context("Failed to build planner client")?;
    info!("Planner ready ({})", config.planner.model);

    let settings = LaunchSettings {
        headful: config.headful,
        window_size: config.window_size(),
        chrome_path: config.chrome_path.clone(),
    };
    info!("Launching Chrome...");
    let driver = tokio::task::spawn_blocking(move || ChromeDriver::launch(&settings))
        .await
        .map_err(|e| anyhow::anyhow!("Browser launch panicked: {}", e))??;

    let agent = Agent::new(
        driver,
        Brain::new(client),
        cli.outdir.clone(),
        AgentOptions::from_config(&config),
    );
    let report = agent.run(&cli.task, cli.url.as_deref()).await;
    if let Some(err) = report.error() {
        error!("Run aborted: {}", err);
    }

    let path = report
        .write(&cli.outdir)
        .with_context(|| format!("Failed to write report to {}", cli.outdir.display()))?;
    info!("Report written to {}", path.display());
    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("agentic_rpa=debug,agent=debug")
    } else {
        EnvFilter::new("agentic_rpa=info,agent=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
