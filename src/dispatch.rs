//! Update routing. teloxide polls Telegram and runs the dispatcher; every chat message
//! is narrowed to a domain update and handed to each stream whose forum thread it was
//! posted in.
//!
//! Stream failures are logged and never stop the other streams or the dispatcher.

use std::sync::Arc;

use teloxide::{
  dispatching::{Dispatcher, UpdateHandler},
  dptree,
  error_handlers::LoggingErrorHandler,
  types::Update as TgUpdate,
};
use tracing::{debug, error, info};

use crate::daily::DailyService;
use crate::domain::Update;
use crate::error::BotError;
use crate::telegram::{domain_update, TelegramClient};

/// Handler tree: keep chat messages, convert them, route them to streams.
pub fn schema() -> UpdateHandler<BotError> {
  dptree::filter_map(|upd: TgUpdate| domain_update(&upd)).endpoint(handle_update)
}

async fn handle_update(service: Arc<DailyService>, update: Update) -> Result<(), BotError> {
  let matched = route(&service, &update).await;
  debug!(target: "boardwhite", update_id = update.update_id, matched, "Update dispatched");
  Ok(())
}

/// Run the update through every stream posted to its thread. Returns how many matched.
pub async fn route(service: &DailyService, update: &Update) -> usize {
  let Some(thread_id) = update.message.as_ref().and_then(|m| m.thread_id) else { return 0 };
  let mut matched = 0;
  for stream in service.streams().iter().filter(|s| s.thread_id == thread_id) {
    matched += 1;
    if let Err(e) = service.on_update(stream, update).await {
      error!(target: "boardwhite", stream = %stream.name, update_id = update.update_id, error = %e, "Handle update failed");
    }
  }
  matched
}

/// Poll and dispatch until ctrl-c.
///
/// Updates from the same sender are handled in order; different senders run concurrently.
pub async fn run_polling(telegram: &TelegramClient, service: Arc<DailyService>, timeout_secs: u64) {
  info!(target: "telegram", "Polling for updates");
  Dispatcher::builder(telegram.bot(), schema())
    .dependencies(dptree::deps![service])
    .distribution_function(|upd| upd.from().map(|u| u.id))
    .default_handler(|upd| async move {
      debug!(target: "telegram", update_id = upd.id.0, "Update ignored");
    })
    .error_handler(LoggingErrorHandler::with_custom_text("Dispatcher error"))
    .enable_ctrlc_handler()
    .build()
    .dispatch_with_listener(
      telegram.polling(timeout_secs),
      LoggingErrorHandler::with_custom_text("getUpdates failed"),
    )
    .await;
  info!(target: "telegram", "Polling stopped");
}
