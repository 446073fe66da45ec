//! wxbridged - weather station bridge
//!
//! Subcommands:
//! - run: stream live observations into the store and the aggregator
//! - backfill: fetch recent history from the provider REST API
//! - merge: fold older observation databases into one

use anyhow::Result;
use argh::FromArgs;
use std::path::PathBuf;
use tracing::{error, info};
use wxb_config::AppConfig;
use wxb_daemon::commands;

#[derive(FromArgs)]
/// Bridge a weather station's live observations to a local store and a public aggregator
struct Args {
    #[argh(subcommand)]
    command: Option<Command>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunArgs),
    Backfill(BackfillArgs),
    Merge(MergeArgs),
}

/// Run the live bridge (default)
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
struct RunArgs {}

/// Fetch recent observations from the provider and store them
#[derive(FromArgs)]
#[argh(subcommand, name = "backfill")]
struct BackfillArgs {
    /// number of days to fetch (default: 5)
    #[argh(option, short = 'd', default = "5")]
    days: u32,
}

/// Merge observation databases into one
#[derive(FromArgs)]
#[argh(subcommand, name = "merge")]
struct MergeArgs {
    /// output database path
    #[argh(option, short = 'o')]
    output: PathBuf,

    /// device id for inputs whose table has no deviceId column
    #[argh(option)]
    device_id: Option<i64>,

    /// input database paths
    #[argh(positional)]
    inputs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    wxb_obs::init("wxbridged");

    let args: Args = argh::from_env();
    let result = match args.command.unwrap_or(Command::Run(RunArgs {})) {
        Command::Run(_) => {
            let cfg = AppConfig::load()?;
            commands::run(&cfg).await
        }
        Command::Backfill(backfill) => {
            let cfg = AppConfig::load()?;
            commands::backfill(&cfg, backfill.days).await.map(|report| {
                info!(
                    fetched = report.fetched,
                    inserted = report.inserted,
                    duplicates = report.duplicates,
                    "backfill complete"
                );
            })
        }
        Command::Merge(merge) => {
            commands::merge(merge.output, &merge.inputs, merge.device_id)
                .await
                .map(|report| {
                    info!(
                        inserted = report.inserted,
                        duplicates = report.duplicates,
                        repaired = report.repaired,
                        "merge complete"
                    );
                })
        }
    };

    if let Err(e) = &result {
        error!("wxbridged failed: {e:#}");
    }
    result
}
