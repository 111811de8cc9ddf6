use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use minepkg::core::error::{MinepkgError, MinepkgResult};
use minepkg::core::instance::Instance;
use minepkg::core::launch::{LaunchOptions, LaunchOutcome, Launcher};
use minepkg::core::state::AppState;

#[derive(Parser)]
#[command(name = "minepkg", version, about = "Minecraft mod and modpack manager")]
struct Cli {
    /// Instance directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve, download and link everything without starting the game
    Prepare {
        #[arg(long)]
        server: bool,
        /// Re-resolve even if the lockfile is current
        #[arg(long)]
        force: bool,
    },
    /// Prepare and start the instance
    Launch {
        #[arg(long)]
        server: bool,
        #[arg(long)]
        force: bool,
        #[arg(long, default_value = "Player")]
        name: String,
    },
    /// List dependencies with newer releases
    Outdated,
}

#[tokio::main]
async fn main() -> ExitCode {
    minepkg::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> MinepkgResult<ExitCode> {
    let global = AppState::load().await?;
    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(MinepkgError::io("."))?,
    };
    let instance = Instance::load(global, dir).await?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Command::Prepare { server, force } => {
            let options = LaunchOptions {
                server,
                ..Default::default()
            };
            Launcher::new(instance, cancel, options)
                .with_force_update(force)
                .prepare()
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Launch {
            server,
            force,
            name,
        } => {
            let options = LaunchOptions {
                server,
                player_name: name,
                ..Default::default()
            };
            let outcome = Launcher::new(instance, cancel, options)
                .with_force_update(force)
                .launch()
                .await?;
            Ok(match outcome {
                LaunchOutcome::Clean => ExitCode::SUCCESS,
                LaunchOutcome::Crashed(_) => ExitCode::FAILURE,
            })
        }
        Command::Outdated => {
            for entry in instance.outdated().await? {
                let current = entry.current.as_deref().unwrap_or("none");
                if entry.is_outdated() {
                    info!("{} ({}): {} -> {}", entry.name, entry.provider, current, entry.latest);
                } else {
                    info!("{} ({}): {} is up to date", entry.name, entry.provider, current);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
