//! Test doubles: a recording `Messenger` with failure injection and update builders.

use std::sync::{
  atomic::{AtomicBool, AtomicI32, Ordering},
  Mutex,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::domain::{IncomingMessage, MessageId, Reaction, ReplyTo, Sender, ThreadId, Update, UserId};
use crate::telegram::{Messenger, TelegramError};

pub const BOT_ID: UserId = 1;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
  SpoilerLink { thread_id: ThreadId, header: String, link: String, id: MessageId },
  Sticker { thread_id: ThreadId, sticker_id: String, id: MessageId },
  Pin(MessageId),
  Unpin(MessageId),
  Reaction(MessageId, Reaction),
}

#[derive(Default)]
pub struct Failures {
  pub send: AtomicBool,
  pub sticker: AtomicBool,
  pub pin: AtomicBool,
  pub unpin: AtomicBool,
  pub reaction: AtomicBool,
}

pub struct FakeMessenger {
  next_id: AtomicI32,
  calls: Mutex<Vec<Call>>,
  pub fail: Failures,
}

impl FakeMessenger {
  pub fn new() -> Self {
    Self { next_id: AtomicI32::new(100), calls: Mutex::new(Vec::new()), fail: Failures::default() }
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn reactions(&self) -> Vec<(MessageId, Reaction)> {
    self.calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Reaction(id, r) => Some((id, r)),
        _ => None,
      })
      .collect()
  }

  pub fn clear(&self) {
    self.calls.lock().unwrap().clear();
  }

  fn record(&self, call: Call) {
    self.calls.lock().unwrap().push(call);
  }

  fn check(flag: &AtomicBool, method: &'static str) -> Result<(), TelegramError> {
    if flag.load(Ordering::SeqCst) {
      return Err(TelegramError::Api { method, description: "Bad Request: injected".into() });
    }
    Ok(())
  }
}

#[async_trait]
impl Messenger for FakeMessenger {
  fn bot_id(&self) -> UserId {
    BOT_ID
  }

  async fn send_spoiler_link(&self, thread_id: ThreadId, header: &str, link: &str) -> Result<MessageId, TelegramError> {
    Self::check(&self.fail.send, "sendMessage")?;
    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    self.record(Call::SpoilerLink { thread_id, header: header.into(), link: link.into(), id });
    Ok(id)
  }

  async fn send_sticker(&self, thread_id: ThreadId, sticker_id: &str) -> Result<MessageId, TelegramError> {
    Self::check(&self.fail.sticker, "sendSticker")?;
    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    self.record(Call::Sticker { thread_id, sticker_id: sticker_id.into(), id });
    Ok(id)
  }

  async fn pin(&self, message_id: MessageId) -> Result<(), TelegramError> {
    Self::check(&self.fail.pin, "pinChatMessage")?;
    self.record(Call::Pin(message_id));
    Ok(())
  }

  async fn unpin(&self, message_id: MessageId) -> Result<(), TelegramError> {
    Self::check(&self.fail.unpin, "unpinChatMessage")?;
    self.record(Call::Unpin(message_id));
    Ok(())
  }

  async fn set_reaction(&self, message_id: MessageId, reaction: Reaction) -> Result<(), TelegramError> {
    Self::check(&self.fail.reaction, "setMessageReaction")?;
    self.record(Call::Reaction(message_id, reaction));
    Ok(())
  }
}

/// A message from `user_id` in `thread_id` replying to the bot's post `reply_to`.
pub fn reply(update_id: i64, thread_id: ThreadId, user_id: UserId, reply_to: MessageId) -> Update {
  Update {
    update_id,
    message: Some(IncomingMessage {
      id: 10_000 + update_id as MessageId,
      thread_id: Some(thread_id),
      sender: Some(Sender { id: user_id, username: None, is_bot: false }),
      reply_to: Some(ReplyTo { id: reply_to, sender_id: Some(BOT_ID) }),
      text: None,
      has_photo: false,
      has_media_spoiler: false,
      date: Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap(),
    }),
  }
}

pub fn with_text(mut update: Update, text: &str) -> Update {
  if let Some(m) = update.message.as_mut() {
    m.text = Some(text.into());
  }
  update
}

pub fn with_photo(mut update: Update, spoiler: bool) -> Update {
  if let Some(m) = update.message.as_mut() {
    m.has_photo = true;
    m.has_media_spoiler = spoiler;
  }
  update
}
