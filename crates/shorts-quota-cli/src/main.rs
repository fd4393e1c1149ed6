use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "shorts-quota", version, about = "Shorts Quota CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Today's count, limit and switches as JSON
    Status,
    /// Set the daily limit
    Limit {
        /// Positive number of views per day
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Turn enforcement on
    Enable,
    /// Turn enforcement off
    Disable,
    /// Flip enforcement on or off
    Toggle,
    /// Show or hide the remaining-quota badge
    Badge {
        #[arg(value_enum)]
        state: commands::settings::Switch,
    },
    /// Reset today's counter
    Reset,
    /// Per-day counters, newest first
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove counters past the retention horizon
    Sweep,
    /// Run an install, update or startup hook
    Lifecycle {
        #[command(subcommand)]
        action: commands::lifecycle::LifecycleAction,
    },
    /// Engine configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Drive content agents through synthetic short-form views
    Simulate(commands::simulate::SimulateArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Status => commands::status::run().await,
        Commands::Limit { value } => commands::settings::limit(value).await,
        Commands::Enable => commands::settings::set_enabled(true).await,
        Commands::Disable => commands::settings::set_enabled(false).await,
        Commands::Toggle => commands::settings::toggle().await,
        Commands::Badge { state } => commands::settings::badge(state).await,
        Commands::Reset => commands::settings::reset().await,
        Commands::History { json } => commands::history::run(json).await,
        Commands::Sweep => commands::sweep::run().await,
        Commands::Lifecycle { action } => commands::lifecycle::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Simulate(args) => commands::simulate::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
