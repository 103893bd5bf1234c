//! Boardwhite · daily-challenge bot
//!
//! - Publishes one catalog problem per day per stream into its forum thread and pins it
//! - Tracks replies to the active post as submissions (ok / clown reactions)
//! - Optional admin HTTP endpoint (health, stream status, manual publish behind `x-admin-token`)
//!
//! Important env variables:
//!   BOT_CONFIG_PATH : path to TOML config (default "config.toml")
//!   TELEGRAM_TOKEN  : overrides `telegram.token` from the config file
//!   LOG_LEVEL       : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

mod catalog;
mod config;
mod daily;
mod day;
mod dispatch;
mod domain;
mod error;
mod protocol;
mod routes;
mod scheduler;
mod store;
mod telegram;
mod telemetry;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info, instrument};

use crate::config::BotConfig;
use crate::daily::DailyService;
use crate::dispatch::run_polling;
use crate::routes::build_router;
use crate::store::{MemoryStore, Store};
use crate::telegram::TelegramClient;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = BotConfig::load_from_env()?;

  let store: Arc<dyn Store> = match &cfg.store.path {
    Some(path) => Arc::new(MemoryStore::open(path).await?),
    None => {
      info!(target: "store", "No store.path configured; state lives in memory only");
      Arc::new(MemoryStore::new())
    }
  };

  let telegram = TelegramClient::connect(&cfg.telegram).await?;
  let service = Arc::new(DailyService::from_config(&cfg, store, Arc::new(telegram.clone()))?);

  let mut scheduler = scheduler::start_scheduler(&cfg, service.clone()).await?;

  let (shutdown_tx, shutdown_rx) = watch::channel(false);

  let http = match (cfg.http.addr, cfg.http.admin_token.clone()) {
    (Some(addr), Some(admin_token)) => {
      let listener = TcpListener::bind(addr).await?;
      info!(target: "boardwhite", %addr, "Admin HTTP listening");
      let app = build_router(service.clone(), admin_token);
      let mut rx = shutdown_rx.clone();
      Some(tokio::spawn(async move {
        let stop = async move {
          let _ = rx.changed().await;
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(stop).await {
          error!(target: "boardwhite", error = %e, "Admin HTTP server failed");
        }
      }))
    }
    _ => None,
  };

  // Returns on ctrl-c.
  run_polling(&telegram, service, cfg.telegram.poll_timeout_secs).await;
  info!(target: "boardwhite", "Shutdown requested");
  let _ = shutdown_tx.send(true);

  if let Err(e) = scheduler.shutdown().await {
    error!(target: "boardwhite", error = ?e, "Scheduler shutdown failed");
  }
  if let Some(h) = http {
    h.await?;
  }
  info!(target: "boardwhite", "Bye");
  Ok(())
}
