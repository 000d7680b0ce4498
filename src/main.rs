use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use datachat::{Config, Dashboard, DatasetClient};

/// datachat - ask questions about an uploaded dataset by text or voice
#[derive(Parser)]
#[command(name = "datachat", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dataset backend URL
    #[arg(long, env = "DATACHAT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Disable voice features (text-only dashboard)
    #[arg(long, env = "DATACHAT_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a CSV dataset, then open the dashboard
    Upload {
        /// CSV file to upload
        file: PathBuf,
        /// Exit after uploading instead of opening the dashboard
        #[arg(long)]
        no_dashboard: bool,
    },
    /// Run the conversational dashboard (default)
    Dashboard,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,datachat=info",
        1 => "info,datachat=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_options(cli.backend_url.as_deref(), cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    let dataset = DatasetClient::new(config.backend_url.clone());

    match cli.command.unwrap_or(Command::Dashboard) {
        Command::Upload { file, no_dashboard } => {
            println!("Uploading {}...", file.display());
            let receipt = dataset.upload_csv(&file).await?;
            println!("{}", receipt.message);
            if !receipt.columns.is_empty() {
                println!("Columns: {}", receipt.columns.join(", "));
            }
            if no_dashboard {
                return Ok(());
            }
            println!("Upload successful! Opening the dashboard...\n");
            dashboard(&config, &dataset).await
        }
        Command::Dashboard => dashboard(&config, &dataset).await,
    }
}

async fn dashboard(config: &Config, dataset: &DatasetClient) -> anyhow::Result<()> {
    tracing::info!(
        backend = %config.backend_url,
        model = %config.generation.model,
        voice = config.voice.enabled,
        "starting dashboard"
    );

    let dashboard = Dashboard::new(config)?;
    let stdin = BufReader::new(tokio::io::stdin());
    dashboard.run(dataset, stdin, std::io::stdout()).await?;

    Ok(())
}
