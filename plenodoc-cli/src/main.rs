use clap::Parser;
use plenodoc_cli::{Cli, execute};
use plenodoc_telemetry::{TelemetryConfig, init_telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&TelemetryConfig::default().with_format(cli.log_format))?;

    if let Err(err) = execute(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}
