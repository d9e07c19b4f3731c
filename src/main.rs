use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wa_giveaway::store::{FileStore, MemoryStore, UpstashStore};
use wa_giveaway::{
    AuthState, Bot, BotConfig, ConsoleConnector, GiveawayController, GuardedStore, KeyValueStore,
    Shutdown, StoreBackend,
};

/// WhatsApp giveaway bot: `@<name>` to join, `!sortear [N]` to draw.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON config file; missing fields take their defaults.
    #[arg(long, env = "WA_GIVEAWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Where credentials, keys and participants are kept.
    #[arg(long, value_enum)]
    store: Option<StoreKind>,

    /// State file for `--store file`.
    #[arg(long, default_value = "./data/state.json")]
    state_file: PathBuf,

    /// Phone number allowed to run the draw (repeatable).
    #[arg(long = "admin")]
    admins: Vec<String>,

    /// Only listed admins may draw, not the bot's own number.
    #[arg(long)]
    no_self_admin: bool,

    /// Number the console client pairs as.
    #[arg(long, env = "WA_GIVEAWAY_SELF_NUMBER", default_value = "5500000000000")]
    self_number: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    Memory,
    File,
    Upstash,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect and run the bot (default).
    Run,
    /// Delete the stored credentials so the next run pairs again.
    ResetSession,
    /// Print the persisted participant list.
    ShowParticipants,
    /// Print the effective configuration.
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wa_giveaway=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = effective_config(&cli)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let store = open_store(&config)?;
            info!(backend = store.backend_name(), "starting");
            let connector = ConsoleConnector::stdin(cli.self_number)
                .with_device_name(config.device_name.clone());
            let bot = Bot::start(config, connector, store).await;
            match bot.run().await? {
                Shutdown::LoggedOut => {
                    eprintln!("Logged out. Run `wa-giveaway reset-session` and pair again.");
                }
                Shutdown::Replaced => eprintln!("Session was opened elsewhere."),
                Shutdown::StreamEnded => info!("session ended"),
            }
        }
        Commands::ResetSession => {
            let store = open_store(&config)?;
            let auth = AuthState::initialize(store, &config.keys).await;
            if auth.clear_credentials().await {
                println!("Credentials cleared.");
            } else {
                return Err("could not clear credentials, the store is unavailable".into());
            }
        }
        Commands::ShowParticipants => {
            let store = open_store(&config)?;
            let giveaway = GiveawayController::from_config(store, &config);
            giveaway.load().await;
            let participants = giveaway.participants();
            if participants.is_empty() {
                println!("No participants.");
            }
            for participant in participants {
                println!("{}\t{}", participant.id, participant.name);
            }
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn effective_config(cli: &Cli) -> Result<BotConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => BotConfig::load(path)?,
        None => BotConfig::default(),
    };

    if let Some(kind) = cli.store {
        config = config.with_store(match kind {
            StoreKind::Memory => StoreBackend::Memory,
            StoreKind::File => StoreBackend::File {
                path: cli.state_file.clone(),
            },
            StoreKind::Upstash => StoreBackend::Upstash,
        });
    }
    for admin in &cli.admins {
        config = config.with_admin(admin.clone());
    }
    if cli.no_self_admin {
        config = config.with_self_is_admin(false);
    }
    config.validate()?;
    Ok(config)
}

fn open_store(config: &BotConfig) -> Result<GuardedStore, Box<dyn std::error::Error>> {
    let timeout = Duration::from_millis(config.store_timeout_ms);
    let backend: Arc<dyn KeyValueStore> = match &config.store {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File { path } => Arc::new(FileStore::new(path.clone())),
        StoreBackend::Upstash => Arc::new(UpstashStore::from_env(timeout)?),
    };
    Ok(GuardedStore::new(backend, config.guard_policy()))
}
