mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use restcheck_common::config::Settings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "restcheck-cli")]
#[command(about = "restcheck CLI - Scaffold projects, validate suites, and browse recorded runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new restcheck project
    Init {
        /// Project path
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Check a test suite file and report rejected records
    Validate {
        /// Suite file (JSON)
        #[arg(short, long)]
        suite: PathBuf,
    },

    /// List recorded executions
    Executions {
        /// Results database (defaults to RESTCHECK_DB or reports/results.db)
        #[arg(short, long)]
        db: Option<PathBuf>,

        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show the results of one execution
    Show {
        /// Results database (defaults to RESTCHECK_DB or reports/results.db)
        #[arg(short, long)]
        db: Option<PathBuf>,

        /// Read the execution from Redis instead of the database
        #[arg(long, conflicts_with = "db")]
        redis: Option<String>,

        /// Execution id
        #[arg(short, long)]
        execution: i64,

        /// Only list failed test cases
        #[arg(long, default_value = "false")]
        failed_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Init { path } => {
            commands::init_project(&path).await?;
        }
        Commands::Validate { suite } => {
            commands::validate_suite(&suite).await?;
        }
        Commands::Executions { db, json } => {
            commands::list_executions(&db.unwrap_or(settings.db_path), json).await?;
        }
        Commands::Show {
            db,
            redis,
            execution,
            failed_only,
        } => match redis {
            Some(url) => commands::show_redis_execution(&url, execution, failed_only).await?,
            None => {
                commands::show_execution(&db.unwrap_or(settings.db_path), execution, failed_only).await?
            }
        },
    }

    Ok(())
}
