//! myp4db-send: builds relation R (and, for joins, relation S) of random
//! tuples and broadcasts them towards the switch.

use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;

use myp4db_wire::config::P4dbConfig;
use myp4db_wire::service::sender::resolve_destination;
use myp4db_wire::service::{RelationGenerator, Sender};
use myp4db_wire::utils::logging::init_logging;
use myp4db_wire::utils::Metrics;
use myp4db_wire::ProtocolError;

/// Relation ids of the two join inputs.
const RELATION_R: u8 = 1;
const RELATION_S: u8 = 2;

#[derive(Parser)]
#[command(name = "myp4db-send")]
#[command(about = "Send MYP4DB relations to a P4 switch", long_about = None)]
struct Cli {
    /// Destination host name or IPv4 address
    destination: String,
    /// Message carried in the trailing UDP datagram
    message: String,
    /// 1 sends both join inputs (R then S), 0 sends only R
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1), default_value_t = 1)]
    is_join: u8,
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            eprintln!("{e}");
            eprintln!("pass 2 arguments: <destination> \"<message>\"");
            exit(1);
        }
    };

    if let Err(err) = run(cli).await {
        if let Some(ProtocolError::InterfaceNotFound(_)) = err.downcast_ref::<ProtocolError>() {
            println!("{err}");
        } else {
            eprintln!("myp4db-send error: {err:?}");
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
    config.validate_strict()?;
    init_logging(&config.logging);

    let dst_ip = resolve_destination(&cli.destination)
        .with_context(|| format!("failed to resolve {}", cli.destination))?;
    let metrics = Arc::new(Metrics::new());
    let sender = Sender::open(&config.sender, Arc::clone(&metrics))?;
    let mut generator = RelationGenerator::from_os_rng(&config.sender)?;

    // first relation, stored on the switch
    let r_relation = sender.frame(dst_ip, generator.generate(RELATION_R, false)?, &cli.message)?;
    print!("{r_relation}");
    sender.transmit(&r_relation).await?;

    if cli.is_join == 1 {
        // second relation, partially reusing R's entity ids
        let s_relation = sender.frame(dst_ip, generator.generate(RELATION_S, true)?, &cli.message)?;
        print!("{s_relation}");
        sender.transmit(&s_relation).await?;
    }

    metrics.log_summary();
    Ok(())
}
