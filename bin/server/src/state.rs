use std::{sync::OnceLock, time::Duration};

use anyhow::{Context, anyhow};
use kvstore::{Store, StoreParams};
use tokio_util::sync::CancellationToken;

use crate::{
  auth::jwt::JwtClient, config::server_config, users::UserDb,
};

static STORE: OnceLock<Store> = OnceLock::new();

pub fn store() -> &'static Store {
  STORE.get().unwrap_or_else(|| {
    error!(
      "FATAL: store accessed before initialized | Ensure init_store() is called during startup | Exiting..."
    );
    std::process::exit(1)
  })
}

/// Must be called in the app startup sequence.
pub fn init_store() {
  let config = server_config();
  let store = Store::startup(StoreParams {
    buffer_size: config.buffer,
    max_depth: config.depth,
    steward_timeout: Duration::from_secs(
      config.steward_timeout_secs,
    ),
  });
  if STORE.set(store).is_err() {
    error!("FATAL: init_store called more than once | Exiting...");
    std::process::exit(1)
  }
}

static USER_DB: OnceLock<UserDb> = OnceLock::new();

pub fn user_db() -> &'static UserDb {
  USER_DB.get().unwrap_or_else(|| {
    error!(
      "FATAL: user db accessed before initialized | Ensure init_user_db() is called during startup | Exiting..."
    );
    std::process::exit(1)
  })
}

/// Must be called in the app startup sequence.
pub fn init_user_db() -> anyhow::Result<()> {
  let db = UserDb::load(&server_config().users_path)
    .context("failed to load user database")?;
  USER_DB
    .set(db)
    .map_err(|_| anyhow!("user database initialized more than once"))
}

pub fn jwt_client() -> &'static JwtClient {
  static JWT_CLIENT: OnceLock<JwtClient> = OnceLock::new();
  JWT_CLIENT.get_or_init(|| {
    match JwtClient::new(server_config()) {
      Ok(client) => client,
      Err(e) => {
        error!(
          "FATAL: Failed to initialize JwtClient | {e:#} | Exiting..."
        );
        std::process::exit(1)
      }
    }
  })
}

/// Cancelled to begin the HTTP server's graceful exit.
pub fn server_shutdown() -> &'static CancellationToken {
  static SERVER_SHUTDOWN: OnceLock<CancellationToken> =
    OnceLock::new();
  SERVER_SHUTDOWN.get_or_init(CancellationToken::new)
}
