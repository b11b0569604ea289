use anyhow::{Context, Result};
use cestt::cli::{App, Cli};
use cestt::report::EventBus;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::from_cli(&cli)?;

    let bus = EventBus::with_sink(|line| eprintln!("{line}"));
    let report = app.run(&bus);
    let json = report.to_json().context("Failed to serialize report")?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
