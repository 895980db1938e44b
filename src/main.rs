use std::path::PathBuf;
use std::process::ExitCode;

use backend::bootstrap;
use backend::config::{self, AppConfig};
use backend::deploy::{DEFAULT_DESCRIPTOR_PATH, DeploymentConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "backend", version, about = "Backend API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize identity and working directories, then serve HTTP (default).
    Serve,
    /// Validate the deployment descriptor and print it as JSON.
    DescribeDeployment {
        #[arg(long, env = "DEPLOY_DESCRIPTOR", default_value = DEFAULT_DESCRIPTOR_PATH)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Loaded before tracing so RUST_LOG from the file applies.
    let dotenv = config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env file"),
    }

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::DescribeDeployment { file } => describe_deployment(&file),
    }
}

async fn serve() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "startup aborted");
            return ExitCode::FAILURE;
        }
    };

    match bootstrap::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "backend exited with error");
            ExitCode::FAILURE
        }
    }
}

fn describe_deployment(file: &std::path::Path) -> ExitCode {
    match DeploymentConfig::load(file).and_then(|cfg| cfg.to_json_pretty()) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(file = %file.display(), error = %e, "deployment descriptor rejected");
            ExitCode::FAILURE
        }
    }
}
