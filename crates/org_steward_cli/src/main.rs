use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod errors;

use commands::common::EngineFlags;
use errors::Error;

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

/// OrgSteward CLI: manage GitHub organizations as code
#[derive(Parser)]
#[command(name = "org-steward")]
#[command(about = "Manage GitHub organization settings as code", long_about = None)]
struct Cli {
    /// Desired-state configuration document.
    #[arg(
        short = 'c',
        long = "config",
        global = true,
        default_value = "org-steward.json"
    )]
    config: PathBuf,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot live organizations into a configuration document
    Import {
        /// Organizations to import.
        #[arg(required = true)]
        organizations: Vec<String>,

        #[command(flatten)]
        flags: EngineFlags,
    },

    /// Validate the configuration document without contacting GitHub
    Validate,

    /// Show the changes an apply would make
    Plan {
        #[command(flatten)]
        flags: EngineFlags,
    },

    /// Apply the configuration to GitHub
    Apply {
        #[command(flatten)]
        flags: EngineFlags,

        /// Skip the interactive confirmation.
        #[arg(short = 'f', long = "force")]
        force: bool,
    },

    /// List the organization's repository security advisories
    ListAdvisories {
        /// Organization login.
        organization: String,
    },
}

/// Exit codes: 0 clean, 1 partial failure or pending destructive drift,
/// 2 hard failure.
const EXIT_OK: u8 = 0;
const EXIT_PARTIAL: u8 = 1;
const EXIT_HARD: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Error: {e}");
            eprintln!("Error: {e}");
            if e.is_hard() {
                EXIT_HARD
            } else {
                EXIT_PARTIAL
            }
        }
    };
    ExitCode::from(code)
}

async fn run(cli: &Cli) -> Result<u8, Error> {
    match &cli.command {
        Commands::Import {
            organizations,
            flags,
        } => {
            commands::import_cmd::execute(&cli.config, organizations, flags).await?;
            Ok(EXIT_OK)
        }
        Commands::Validate => {
            let errors = commands::validate_cmd::execute(&cli.config)?;
            Ok(if errors == 0 { EXIT_OK } else { EXIT_PARTIAL })
        }
        Commands::Plan { flags } => {
            let totals = commands::plan_cmd::execute(&cli.config, flags).await?;
            Ok(if totals.failed_orgs > 0 {
                EXIT_PARTIAL
            } else {
                EXIT_OK
            })
        }
        Commands::Apply { flags, force } => {
            let totals = commands::apply_cmd::execute(&cli.config, flags, *force).await?;
            Ok(apply_exit_code(&totals))
        }
        Commands::ListAdvisories { organization } => {
            commands::advisories_cmd::execute(organization).await?;
            Ok(EXIT_OK)
        }
    }
}

/// A non-zero exit when any entity failed, or when deletions were computed
/// but not enabled (informational drift, not an error message).
fn apply_exit_code(totals: &commands::apply_cmd::ApplyTotals) -> u8 {
    if totals.aborted {
        return EXIT_PARTIAL;
    }
    if totals.failed_entities > 0 || totals.failed_orgs > 0 || totals.suppressed_deletes > 0 {
        EXIT_PARTIAL
    } else {
        EXIT_OK
    }
}

fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_env("ORG_STEWARD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "org_steward=info,github_client=warn",
            1 => "org_steward=debug,github_client=debug,config_model=debug",
            _ => "trace",
        })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
