//! latchkey library - http handlers and application setup.
//!
//! this crate provides the http server and handlers for the latchkey
//! activation server:
//! - [`handlers`]: http request handlers for the activation protocol
//! - [`activation`]: the activation orchestrator state machine
//! - [`cli`]: command-line interface implementation

#![warn(missing_docs)]

/// the activation orchestrator state machine.
pub mod activation;
/// cli subcommands for latchkey.
pub mod cli;
/// http request handlers for the activation protocol.
pub mod handlers;

use std::path::Path;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::fs;

use latchkey_db::LatchkeyDb;
use latchkey_seal::PlatformKeys;
use latchkey_types::Config;

/// shared state for all http handlers.
#[derive(Clone)]
pub struct AppState {
    /// database connection for persistent storage.
    pub db: LatchkeyDb,
    /// server configuration.
    pub config: Arc<Config>,
    /// the platform signing keypair.
    pub keys: Arc<PlatformKeys>,
    /// spki pem of the platform public key, precomputed for `/key`.
    pub public_key_pem: String,
}

/// load the platform keypair from disk, or generate and persist a new one.
///
/// if the private key file exists it is read as pkcs#8 pem; otherwise a
/// fresh keypair is generated and both private and public pem forms are
/// written before any signing occurs.
pub async fn load_or_generate_platform_keys(
    private_path: &Path,
    public_path: &Path,
) -> std::io::Result<PlatformKeys> {
    if private_path.exists() {
        let pem = fs::read_to_string(private_path).await?;
        let keys = PlatformKeys::from_pkcs8_pem(&pem)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        // re-derive the public pem if it was lost
        if !public_path.exists() {
            let public_pem = keys
                .public_key_pem()
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            fs::write(public_path, public_pem).await?;
        }

        Ok(keys)
    } else {
        let keys = PlatformKeys::generate();

        if let Some(parent) = private_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        if let Some(parent) = public_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let private_pem = keys
            .private_key_pem()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let public_pem = keys
            .public_key_pem()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        fs::write(private_path, private_pem.as_str()).await?;
        fs::write(public_path, public_pem).await?;

        Ok(keys)
    }
}

/// create the axum application with all routes.
///
/// the keypair is injected rather than loaded here so tests can supply
/// ephemeral keys.
pub fn create_app(db: LatchkeyDb, config: Config, keys: PlatformKeys) -> Router {
    let public_key_pem = keys
        .public_key_pem()
        .expect("ed25519 public key always encodes as pem");

    let state = AppState {
        db,
        config: Arc::new(config),
        keys: Arc::new(keys),
        public_key_pem,
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/key", get(handlers::key))
        .route("/api/v1/activate", post(handlers::activate))
        .with_state(state)
}
