use std::{collections::HashMap, path::Path};

use anyhow::{Context, anyhow};
use serde::Deserialize;

const BCRYPT_COST: u32 = 10;

/// Credential list format of the users file:
///
/// ```toml
/// [[user]]
/// username = "admin"
/// password = "..."
/// ```
#[derive(Deserialize)]
struct UserFile {
  #[serde(default, rename = "user")]
  users: Vec<UserEntry>,
}

#[derive(Deserialize)]
struct UserEntry {
  username: String,
  password: String,
}

pub struct UserDb {
  /// username -> bcrypt hash
  users: HashMap<String, String>,
  /// Verified against for unknown usernames, so login latency
  /// does not reveal whether an account exists.
  decoy_hash: String,
}

impl UserDb {
  pub fn load(path: &Path) -> anyhow::Result<UserDb> {
    let contents =
      std::fs::read_to_string(path).with_context(|| {
        format!("failed to read users file at {path:?}")
      })?;
    let file: UserFile =
      toml::from_str(&contents).with_context(|| {
        format!("failed to parse users file at {path:?}")
      })?;
    UserDb::from_entries(file.users, BCRYPT_COST)
  }

  fn from_entries(
    entries: Vec<UserEntry>,
    cost: u32,
  ) -> anyhow::Result<UserDb> {
    let mut users = HashMap::new();
    for entry in entries {
      if entry.username.is_empty() {
        return Err(anyhow!(
          "users file contains an empty username"
        ));
      }
      let hash =
        bcrypt::hash(&entry.password, cost).with_context(|| {
          format!(
            "failed to hash password for user {}",
            entry.username
          )
        })?;
      users.insert(entry.username, hash);
    }
    let decoy_hash = bcrypt::hash("decoy password", cost)
      .context("failed to hash decoy password")?;
    info!("user database loaded with {} users", users.len());
    Ok(UserDb { users, decoy_hash })
  }

  pub fn check_password(
    &self,
    username: &str,
    password: &str,
  ) -> bool {
    let Some(hash) = self.users.get(username) else {
      // Burn the same verify time as a real user would.
      let _ = bcrypt::verify(password, &self.decoy_hash);
      return false;
    };
    bcrypt::verify(password, hash).unwrap_or(false)
  }
}
