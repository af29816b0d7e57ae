//! Vantage entry point.
//!
//! Loads the configuration, installs logging and then either serves (registers
//! extensions and gathers until a shutdown signal) or runs one management command
//! against the database.

mod builtin;
mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{anyhow, Context, Result};
use cli::{CliArgs, CliCommand};
use config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use vantage_extension_api::{PlayerUuid, ServerUuid};
use vantage_extensions::store::queries::ExtensionInformationQuery;
use vantage_extensions::store::transactions::{
    RemoveEverythingTransaction, RemoveUnsatisfiedConditionalResultsTransaction,
};
use vantage_extensions::{
    Database, ErrorLogger, ExtensionJsonRenderer, ExtensionService, FileExtensionSettings,
    GatherScheduler, JsonCache, Processing,
};

/// Most players in a dumped players table.
const PLAYERS_TABLE_LIMIT: usize = 2500;

/// Loaded configuration and the database it points at.
pub struct Application {
    config: AppConfig,
    config_path: PathBuf,
    database: Arc<Database>,
}

impl Application {
    pub async fn new(args: &CliArgs) -> Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = &args.log_level {
            config.logging.level = log_level.clone();
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;
        logging::setup_logging(&config.logging)?;

        let database_path = AppConfig::resolve_path(&args.config_path, &config.database.path);
        let database = Database::open(&database_path)
            .with_context(|| format!("opening database {}", database_path.display()))?;
        info!(
            "Config: {} | Database: {}",
            args.config_path.display(),
            database_path.display()
        );

        Ok(Self {
            config,
            config_path: args.config_path.clone(),
            database: Arc::new(database),
        })
    }

    fn server_uuid(&self) -> ServerUuid {
        self.config.server.uuid
    }

    pub async fn run(self, command: CliCommand) -> Result<()> {
        match command {
            CliCommand::Serve => self.serve().await,
            CliCommand::Dump { player } => self.dump(player.as_deref()),
            CliCommand::List => self.list(),
            CliCommand::Wipe => {
                self.database.execute_transaction(&RemoveEverythingTransaction)?;
                info!("Removed all stored extension values");
                Ok(())
            }
            CliCommand::Cleanup => {
                self.database
                    .execute_transaction(&RemoveUnsatisfiedConditionalResultsTransaction::everything())?;
                info!("Removed unsatisfied conditional values");
                Ok(())
            }
        }
    }

    async fn serve(self) -> Result<()> {
        let settings_path = AppConfig::resolve_path(&self.config_path, &self.config.gathering.settings_file);
        let settings = FileExtensionSettings::load(&settings_path)?;
        let cache = Arc::new(JsonCache::new(self.config.cache.idle_expiry()));
        let processing = Processing::from_current(self.config.gathering.workers)?;

        let service = ExtensionService::new(
            self.server_uuid(),
            Arc::clone(&self.database),
            Arc::new(settings),
            Arc::clone(&cache),
            processing,
            Arc::new(ErrorLogger::new()),
        );

        let extension = Arc::new(builtin::ServerStatusExtension::new(self.config.server.name.clone()));
        match service.register(extension) {
            Ok(Some(_)) => info!("Registered built-in extension '{}'", builtin::PLUGIN_NAME),
            Ok(None) => info!("Built-in extension '{}' is disabled", builtin::PLUGIN_NAME),
            Err(e) => error!("Could not register built-in extension: {}", e),
        }

        let periodic = GatherScheduler::schedule_periodic(&service, self.config.gathering.periodic_interval());
        if periodic.is_none() {
            warn!("Periodic gathering is disabled");
        }

        let cache_cleaner = {
            let cache = Arc::clone(&cache);
            let period = self.config.cache.idle_expiry();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    interval.tick().await;
                    let removed = cache.clean_up();
                    if removed > 0 {
                        tracing::debug!(removed, "Dropped idle cached documents");
                    }
                }
            })
        };

        info!(
            "Vantage is gathering for server '{}' ({}) with {} workers",
            self.config.server.name,
            self.server_uuid(),
            self.config.gathering.workers
        );
        info!("Press Ctrl+C to shut down");

        let signal = signals::wait_for_shutdown().await?;

        info!(%signal, "Shutting down");
        if let Some(task) = periodic {
            task.cancel();
        }
        cache_cleaner.abort();
        service.shutdown();

        // Let gathers that already started finish their transaction.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let errors = service.error_logger().count();
        if errors > 0 {
            warn!("{} extension errors were logged during this run", errors);
        }
        info!("Shutdown complete");
        Ok(())
    }

    fn dump(&self, player: Option<&str>) -> Result<()> {
        let renderer = ExtensionJsonRenderer::new(Arc::clone(&self.database), Arc::new(JsonCache::default()));
        let json = match player {
            Some(player) => {
                let player: PlayerUuid = player
                    .parse()
                    .with_context(|| format!("'{player}' is not a player uuid"))?;
                renderer.player_json(player)?
            }
            None => {
                let tabs: serde_json::Value = serde_json::from_str(&renderer.server_tabs_json(self.server_uuid())?)?;
                let players: serde_json::Value =
                    serde_json::from_str(&renderer.players_table_json(self.server_uuid(), PLAYERS_TABLE_LIMIT)?)?;
                Arc::new(serde_json::to_string_pretty(&serde_json::json!({
                    "server": self.server_uuid(),
                    "extensions": tabs,
                    "players": players,
                }))?)
            }
        };
        println!("{json}");
        Ok(())
    }

    fn list(&self) -> Result<()> {
        let catalog = self.database.query(&ExtensionInformationQuery {
            server: self.server_uuid(),
        })?;
        if catalog.is_empty() {
            println!("No extensions stored for server {}", self.server_uuid());
            return Ok(());
        }
        for entry in catalog {
            println!(
                "{:<30} providers: {:>3} (disabled: {}) values: {:>6} last updated: {}",
                entry.information.name,
                entry.providers,
                entry.disabled_providers,
                entry.stored_values,
                entry.last_updated
            );
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let app = Application::new(&args).await?;
    app.run(args.command).await
}
