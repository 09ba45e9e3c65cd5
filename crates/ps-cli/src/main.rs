mod commands;
mod settings;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ps_scan::ScanOverrides;
use tracing_subscriber::EnvFilter;

use crate::commands::ScanArgs;

#[derive(Parser, Debug)]
#[command(name = "profilescan")]
#[command(about = "Batch profile-likelihood scans over a grid of parameters of interest")]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Run configuration (JSON)
    #[arg(short = 'i', long)]
    config: PathBuf,

    /// Comma separated POIs with values, e.g. "mu=1,mH=125"
    #[arg(long)]
    overwrite_poi: Option<String>,

    /// Parameter ranges, e.g. "mu=[-5:10],mH=[120:130]"
    #[arg(long)]
    overwrite_range: Option<String>,

    /// Parameter bin counts, e.g. "mu=5,mH=100"
    #[arg(long)]
    overwrite_bins: Option<String>,
}

impl ConfigArgs {
    fn overrides(&self) -> ScanOverrides {
        ScanOverrides {
            poi: self.overwrite_poi.clone(),
            range: self.overwrite_range.clone(),
            bins: self.overwrite_bins.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one job's share of the grid
    Scan {
        #[command(flatten)]
        config: ConfigArgs,

        /// Number of this job, from 0
        #[arg(short, long, default_value = "0")]
        counter: u64,

        /// Number of grid jobs
        #[arg(short, long, default_value = "1")]
        jobs: u64,

        /// Run the unconditional fit in an extra job with counter == jobs
        #[arg(long)]
        reserve_unconditional: bool,

        /// Output directory
        #[arg(short, long, default_value = "batchOutput")]
        output: PathBuf,

        /// Worker threads within this job
        #[arg(long, default_value = "1")]
        threads: usize,
    },

    /// Print the batch plan as JSON
    Plan {
        #[command(flatten)]
        config: ConfigArgs,

        #[arg(short, long, default_value = "1")]
        jobs: u64,

        #[arg(long)]
        reserve_unconditional: bool,
    },

    /// Show how a 2-D grid is enumerated and split into jobs
    Enumerate {
        #[command(flatten)]
        config: ConfigArgs,

        #[arg(short, long, default_value = "1")]
        jobs: u64,
    },

    /// Merge job logs into a profile likelihood
    Aggregate {
        /// Job log files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (JSON)
        #[arg(short, long, default_value = "PL_data.json")]
        output: PathBuf,

        /// Subtract the minimum NLL from every cell
        #[arg(long)]
        subtract_min_nll: bool,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Scan {
            config,
            counter,
            jobs,
            reserve_unconditional,
            output,
            threads,
        } => {
            let args = ScanArgs {
                overrides: config.overrides(),
                config: config.config,
                counter,
                jobs,
                reserve_unconditional,
                output,
                threads,
            };
            commands::scan(&args)?;
        }
        Command::Plan {
            config,
            jobs,
            reserve_unconditional,
        } => {
            let plan = commands::plan(&config.config, &config.overrides(), jobs, reserve_unconditional)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Enumerate { config, jobs } => {
            print!("{}", commands::enumerate(&config.config, &config.overrides(), jobs)?);
        }
        Command::Aggregate {
            inputs,
            output,
            subtract_min_nll,
        } => {
            commands::aggregate(&inputs, &output, subtract_min_nll)?;
        }
    }

    tracing::info!("Done");
    Ok(())
}
