use std::net::SocketAddr;

use anyhow::Context;

#[macro_use]
extern crate tracing;

mod api;
mod auth;
mod config;
mod helpers;
mod state;
mod users;

async fn app() -> anyhow::Result<()> {
  let config = config::server_config();
  logger::init(&config.logging)?;

  info!("KV server version: v{}", env!("CARGO_PKG_VERSION"));
  info!("{:?}", config.sanitized());

  state::init_store();
  state::init_user_db()?;
  // Touch the jwt client so a bad configuration fails at startup
  // instead of on the first login.
  state::jwt_client();

  let socket_addr = format!("{}:{}", config.bind_ip, config.port)
    .parse::<SocketAddr>()
    .context("invalid bind_ip / port combination")?;
  let listener = tokio::net::TcpListener::bind(&socket_addr)
    .await
    .with_context(|| format!("failed to bind {socket_addr}"))?;

  info!("server listening on {socket_addr}");

  axum::serve(
    listener,
    api::router()
      .into_make_service_with_connect_info::<SocketAddr>(),
  )
  .with_graceful_shutdown(
    state::server_shutdown().clone().cancelled_owned(),
  )
  .await
  .context("server crashed")?;

  info!("server exited cleanly");
  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  let mut term_signal = tokio::signal::unix::signal(
    tokio::signal::unix::SignalKind::terminate(),
  )?;

  let mut app = tokio::spawn(app());

  tokio::select! {
    res = &mut app => return res?,
    _ = term_signal.recv() => {
      info!("received SIGTERM, closing the store");
      if let Err(e) = state::store().shutdown().await {
        warn!("store already shutting down | {e:#}");
      }
      state::server_shutdown().cancel();
    }
  }

  // Let the HTTP layer drain before the runtime goes away.
  app.await??;

  Ok(())
}
