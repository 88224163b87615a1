//! the `serve` subcommand - runs the activation server.

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use latchkey_db::LatchkeyDb;
use latchkey_types::Config;

/// default config file search paths (in order of priority).
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "/etc/latchkey/config.toml",
    "./config.toml",
];

/// run the latchkey activation server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// path to config file (toml format)
    #[arg(short, long, env = "LATCHKEY_CONFIG")]
    config: Option<PathBuf>,

    /// database url (sqlite:// or postgres://)
    #[arg(long, env = "LATCHKEY_DATABASE_URL")]
    database_url: Option<String>,

    /// address to listen on
    #[arg(long, env = "LATCHKEY_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// server url (for client configuration)
    #[arg(long, env = "LATCHKEY_SERVER_URL")]
    server_url: Option<String>,

    /// path to the platform signing private key (pkcs#8 pem)
    #[arg(long, env = "LATCHKEY_PLATFORM_KEY")]
    platform_key_path: Option<PathBuf>,

    /// log level
    #[arg(long, env = "LATCHKEY_LOG_LEVEL")]
    log_level: Option<String>,
}

/// find and load a config file, returning none if no config file is found.
pub(crate) fn load_config_file(config_path: Option<&PathBuf>) -> Result<Option<Config>> {
    // an explicit path must exist
    if let Some(path) = config_path {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {:?}", path))?;
        return Ok(Some(config));
    }

    // search default paths
    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            debug!("found config file at {:?}", path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {:?}", path))?;
            return Ok(Some(config));
        }
    }

    Ok(None)
}

impl ServeCommand {
    /// convert cli arguments into a config struct, merging with config
    /// file if present.
    ///
    /// priority order: defaults -> config file -> cli flags
    fn into_config(self) -> Result<Config> {
        let mut config = match load_config_file(self.config.as_ref())? {
            Some(file_config) => {
                info!("loaded configuration from file");
                file_config
            }
            None => {
                debug!("no config file found, using defaults");
                Config::default()
            }
        };

        if let Some(db_url) = self.database_url {
            config.database = super::parse_database_url(&db_url)?;
        }
        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(server_url) = self.server_url {
            config.server_url = server_url;
        }
        if let Some(key_path) = self.platform_key_path {
            config.platform_public_key_path = key_path.with_extension("pub");
            config.platform_key_path = key_path;
        }

        Ok(config)
    }

    /// run the serve command
    pub async fn run(self) -> Result<()> {
        // initialize logging (cli override or default to info)
        let log_level_str = self.log_level.clone().unwrap_or_else(|| "info".to_string());
        let log_level = match log_level_str.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };

        let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
        tracing::subscriber::set_global_default(subscriber)?;

        info!("starting latchkey...");

        let config = self.into_config()?;
        info!("database: {}", config.database.connection_string);
        info!("listen address: {}", config.listen_addr);

        // ensure parent directory exists for sqlite databases
        if config.database.db_type == "sqlite" {
            let db_path = std::path::Path::new(&config.database.connection_string);
            if let Some(parent) = db_path.parent()
                && !parent.exists()
            {
                info!("creating database directory: {:?}", parent);
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory: {:?}", parent)
                })?;
            }
        }

        // initialize database (runs migrations)
        let db = LatchkeyDb::new(&config.database)
            .await
            .context("failed to initialize database")?;
        info!("database initialized");

        // load or generate the platform signing keypair
        info!(
            "loading platform signing key from {:?}",
            config.platform_key_path
        );
        let keys = crate::load_or_generate_platform_keys(
            &config.platform_key_path,
            &config.platform_public_key_path,
        )
        .await
        .with_context(|| {
            format!(
                "failed to load/generate platform key: {:?}",
                config.platform_key_path
            )
        })?;
        info!("platform signing key ready");

        let listen_addr = config.listen_addr.clone();
        let app = crate::create_app(db, config, keys);

        let listener = TcpListener::bind(&listen_addr)
            .await
            .with_context(|| format!("failed to bind {listen_addr}"))?;
        info!("listening on {}", listen_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        Ok(())
    }
}

/// resolve on ctrl-c or sigterm.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
