//! Sensor Registry - Main Entry Point

use anyhow::Context;
use cli::{execute, init_logging, Args, CliConfig, CliError, Command, USAGE};
use data_validator::Validator;
use registry::{load_batch, Registry, SeedBatch};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = CliConfig::load(args.config.as_deref())?;
    init_logging(config.level()?)?;

    info!("=== Sensor Registry v{} ===", env!("CARGO_PKG_VERSION"));
    let mut registry = Registry::connect(&config.registry).await?;
    let validator = Validator::new(config.validation.clone());

    for path in &args.seeds {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading seed file {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing seed file {}", path.display()))?;
        let batch = SeedBatch::from_json(&value)?;
        let summary = load_batch(&mut registry, &validator, &batch)
            .await
            .with_context(|| format!("loading seed file {}", path.display()))?;
        info!("Seeded from {}: {:?}", path.display(), summary);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let request = match Command::parse(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Help)) => {
                println!("{}", USAGE);
                continue;
            }
            Ok(Some(Command::Quit)) => break,
            Ok(Some(Command::Request(request))) => request,
            Err(err) => {
                print_error(&err);
                continue;
            }
        };

        match execute(&mut registry, &validator, request).await {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(err) => print_error(&CliError::from(err)),
        }
    }

    registry.close().await?;
    Ok(())
}

fn print_error(err: &CliError) {
    error!("{}", err);
    match serde_json::to_string_pretty(&err.report()) {
        Ok(report) => println!("{}", report),
        Err(e) => error!("Failed to encode error report: {}", e),
    }
}
