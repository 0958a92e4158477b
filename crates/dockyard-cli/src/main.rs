//! dockyard CLI.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use dockyard_core::ProbeStrategy;

mod commands;
mod progress;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(about = "Build, run and deploy the chatter service locally and in CI", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Settings file (defaults to ./dockyard.kdl when present)
    #[arg(long, global = true, env = "DOCKYARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override a setting; may be repeated
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub overrides: Vec<String>,

    /// Print the commands a task would run without running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// How existing docker resources are detected
    #[arg(long, value_enum, default_value_t = ProbeArg::Exact, global = true)]
    pub probe: ProbeArg,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ProbeArg {
    /// Match whole resource names
    Exact,
    /// Search listings for the name anywhere
    Substring,
}

impl From<ProbeArg> for ProbeStrategy {
    fn from(arg: ProbeArg) -> Self {
        match arg {
            ProbeArg::Exact => ProbeStrategy::Exact,
            ProbeArg::Substring => ProbeStrategy::Substring,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task
    Run {
        /// Task name, e.g. configure or docker:build-server
        task: String,
    },
    /// List available tasks
    List,
    /// Show the steps a task would run
    Show {
        /// Task name
        task: String,
    },
    /// Print the resolved settings as JSON (secrets masked)
    Config,
    /// Run a task given directly, e.g. `dockyard db:start`
    #[command(external_subcommand)]
    Task(Vec<String>),
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let result = match cli.command {
        Commands::Run { task } => commands::run::run(&cli.global, &task).await,
        Commands::Task(args) => match args.as_slice() {
            [task] => commands::run::run(&cli.global, task).await,
            _ => Err(anyhow::anyhow!(
                "expected a single task name, got: {}",
                args.join(" ")
            )),
        },
        Commands::List => commands::tasks::list(),
        Commands::Show { task } => commands::tasks::show(&cli.global, &task),
        Commands::Config => commands::config::show(&cli.global),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
