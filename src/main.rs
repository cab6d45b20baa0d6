/// Launch Relay Bot
///
/// Watches SpaceX-related accounts on X and the SpaceX launch feed, and
/// republishes matching posts and upcoming launches from the bot account.
///
/// The bot:
/// - Searches each configured category on its own schedule
/// - Filters launch-day posts and classifies Elon's posts by topic
/// - Keeps a JSON list of republished ids so nothing is posted twice
/// - Tightens polling around launches when the launch window is enabled

use anyhow::Result;
use clap::{Parser, Subcommand};
use launch_relay_bot::{bot, config, launches::LaunchEndpoint};

#[derive(Parser)]
#[command(name = "launch_relay_bot", version, about = "Republish SpaceX updates on X")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one cycle and exit (default)
    Run,
    /// Keep running, sleeping between cycles
    Watch,
    /// List launches from the SpaceX feed
    Launches {
        /// Show past launches instead of upcoming ones
        #[arg(long)]
        past: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    pretty_env_logger::init();

    let cli = Cli::parse();

    log::info!("Script started");

    // Load configuration from environment
    let cfg = config::Config::from_env()?;
    cfg.validate()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => bot::run_bot(cfg, bot::RunMode::Once).await?,
        Command::Watch => bot::run_bot(cfg, bot::RunMode::Watch).await?,
        Command::Launches { past } => {
            let endpoint = if past {
                LaunchEndpoint::Past
            } else {
                LaunchEndpoint::Upcoming
            };
            bot::list_launches(&cfg, endpoint).await?
        }
    }

    Ok(())
}
