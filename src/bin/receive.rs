//! myp4db-receive: prints every captured MYP4DB frame until interrupted.

use std::io::Write;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;

use myp4db_wire::config::P4dbConfig;
use myp4db_wire::core::show::DumpFormat;
use myp4db_wire::service::Receiver;
use myp4db_wire::utils::logging::init_logging;
use myp4db_wire::utils::Metrics;
use myp4db_wire::ProtocolError;

#[derive(Parser)]
#[command(name = "myp4db-receive")]
#[command(about = "Capture and print MYP4DB relations", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print one JSON object per frame instead of a layer dump
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    };

    if let Err(err) = run(cli).await {
        if let Some(ProtocolError::InterfaceNotFound(_)) = err.downcast_ref::<ProtocolError>() {
            println!("{err}");
        } else {
            eprintln!("myp4db-receive error: {err:?}");
        }
        exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => P4dbConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => P4dbConfig::default(),
    };
    config.apply_env()?;
    if cli.json {
        config.receiver.output = DumpFormat::Json;
    }
    config.validate_strict()?;
    init_logging(&config.logging);

    let metrics = Arc::new(Metrics::new());
    let receiver = Receiver::open(&config.receiver, Arc::clone(&metrics))?;
    let output = config.receiver.output;

    println!("sniffing on {}", receiver.interface());
    std::io::stdout().flush()?;

    receiver
        .run(|frame| {
            let rendered = match output.render(frame) {
                Ok(rendered) => rendered,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to render frame");
                    return;
                }
            };
            let mut stdout = std::io::stdout().lock();
            if output == DumpFormat::Show {
                let _ = writeln!(stdout, "got a packet");
                let _ = write!(stdout, "{rendered}");
            } else {
                let _ = writeln!(stdout, "{rendered}");
            }
            let _ = stdout.flush();
        })
        .await?;

    metrics.log_summary();
    Ok(())
}
