use std::{path::PathBuf, sync::OnceLock};

use clap::Parser;
use colored::Colorize;
use logger::{LogConfig, LogLevel};
use serde::Deserialize;

/// CLI flags. Anything not passed falls back to the environment,
/// then to the optional config file, then to defaults.
#[derive(Parser)]
#[command(
  name = "server",
  about = "In-memory key value store over HTTP"
)]
pub struct CliArgs {
  /// Port to serve on.
  #[arg(long, short)]
  pub port: Option<u16>,
  /// Maximum number of keys held before LRU eviction kicks in.
  #[arg(long)]
  pub depth: Option<usize>,
  /// Store request queue capacity.
  #[arg(long)]
  pub buffer: Option<usize>,
  /// Path to a TOML config file.
  #[arg(long)]
  pub config_path: Option<PathBuf>,
  /// Override the configured log level.
  #[arg(long)]
  pub log_level: Option<tracing::Level>,
}

#[derive(Deserialize)]
struct Env {
  kv_port: Option<u16>,
  kv_bind_ip: Option<String>,
  kv_depth: Option<usize>,
  kv_buffer: Option<usize>,
  kv_steward_timeout_secs: Option<u64>,
  kv_users_path: Option<PathBuf>,
  kv_jwt_secret: Option<String>,
  kv_jwt_ttl_secs: Option<u64>,
  kv_config_path: Option<PathBuf>,
  kv_log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Port the HTTP server binds. Required.
  pub port: u16,
  pub bind_ip: String,
  /// Key table capacity. Least recently used keys are evicted
  /// beyond it.
  pub depth: usize,
  /// Store request queue capacity.
  pub buffer: usize,
  /// Store supervisor liveness deadline in seconds.
  pub steward_timeout_secs: u64,
  /// TOML file containing the user credential list.
  pub users_path: PathBuf,
  /// HS256 signing secret. A random one is generated when empty,
  /// which invalidates issued tokens across restarts.
  pub jwt_secret: String,
  /// Seconds a login token stays valid.
  pub jwt_ttl_secs: u64,
  pub logging: LogConfig,
}

impl Default for ServerConfig {
  fn default() -> ServerConfig {
    ServerConfig {
      port: 0,
      bind_ip: String::from("127.0.0.1"),
      depth: 1000,
      buffer: 100,
      steward_timeout_secs: 10,
      users_path: PathBuf::from("users.toml"),
      jwt_secret: String::new(),
      jwt_ttl_secs: 3600,
      logging: LogConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Debug view with the signing secret masked.
  pub fn sanitized(&self) -> ServerConfig {
    let mut config = self.clone();
    if !config.jwt_secret.is_empty() {
      config.jwt_secret = String::from("***");
    }
    config
  }
}

pub fn server_args() -> &'static CliArgs {
  static SERVER_ARGS: OnceLock<CliArgs> = OnceLock::new();
  SERVER_ARGS.get_or_init(CliArgs::parse)
}

pub fn server_config() -> &'static ServerConfig {
  static SERVER_CONFIG: OnceLock<ServerConfig> = OnceLock::new();
  SERVER_CONFIG.get_or_init(|| {
    let env: Env = envy::from_env()
      .expect("failed to parse server environment");
    let args = server_args();

    let config_path =
      args.config_path.as_ref().or(env.kv_config_path.as_ref());
    let file = match config_path {
      Some(path) => {
        let contents = std::fs::read_to_string(path)
          .expect("failed to read config file");
        toml::from_str::<ServerConfig>(&contents)
          .expect("failed to parse config file")
      }
      None => {
        println!(
          "{}: no config path provided, using default config",
          "INFO".green(),
        );
        ServerConfig::default()
      }
    };

    let config = merge(args, env, file);

    if config.port == 0 {
      println!(
        "{}: no port received (set --port or KV_PORT)",
        "ERROR".red(),
      );
      std::process::exit(1)
    }
    if config.depth == 0 {
      println!(
        "{}: store depth must be at least 1",
        "ERROR".red(),
      );
      std::process::exit(1)
    }

    config
  })
}

fn merge(
  args: &CliArgs,
  env: Env,
  config: ServerConfig,
) -> ServerConfig {
  ServerConfig {
    port: args.port.or(env.kv_port).unwrap_or(config.port),
    bind_ip: env.kv_bind_ip.unwrap_or(config.bind_ip),
    depth: args.depth.or(env.kv_depth).unwrap_or(config.depth),
    buffer: args
      .buffer
      .or(env.kv_buffer)
      .unwrap_or(config.buffer),
    steward_timeout_secs: env
      .kv_steward_timeout_secs
      .unwrap_or(config.steward_timeout_secs),
    users_path: env.kv_users_path.unwrap_or(config.users_path),
    jwt_secret: env.kv_jwt_secret.unwrap_or(config.jwt_secret),
    jwt_ttl_secs: env
      .kv_jwt_ttl_secs
      .unwrap_or(config.jwt_ttl_secs),
    logging: LogConfig {
      level: args
        .log_level
        .map(LogLevel::from)
        .or(env.kv_log_level)
        .unwrap_or(config.logging.level),
      ..config.logging
    },
  }
}
