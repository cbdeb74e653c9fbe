mod probe;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use probe::ProbeCommand;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    color: colorchoice_clap::Color,

    #[command(subcommand)]
    command: Commands,

    /// Output plain JSON without color and interactivity
    #[arg(short, long, global = true)]
    json: bool,

    /// Log protocol traffic to stderr (-v for debug, -vv for every report)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    Probe(ProbeCommand),
}

impl Cli {
    /// `RUST_LOG` wins over the verbosity flag.
    fn env_filter(&self) -> EnvFilter {
        let level = match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };

        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }
}

pub async fn execute() -> Result<()> {
    let cli = Cli::parse();

    cli.color.write_global();
    tracing_subscriber::fmt()
        .with_env_filter(cli.env_filter())
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Probe(cmd) => cmd.execute(&cli).await,
    }
}
