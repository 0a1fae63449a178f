use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "eyerest-cli", version, about = "EyeRest 20-20-20 break reminder CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Break timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Break and exercise statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Achievement progress
    Achievements {
        #[command(subcommand)]
        action: commands::achievements::AchievementsAction,
    },
    /// Synced user settings
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Local configuration (account, remote store, scheduler)
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Multi-device sync
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Drive the timer on a fixed cadence until interrupted
    Run(commands::run::RunArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("EYEREST_LOG")
        .unwrap_or_else(|_| EnvFilter::new("eyerest=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action).await,
        Commands::Stats { action } => commands::stats::run(action).await,
        Commands::Achievements { action } => commands::achievements::run(action),
        Commands::Settings { action } => commands::settings::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Sync { action } => commands::sync::run(action).await,
        Commands::Run(args) => commands::run::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
