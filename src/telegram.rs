//! Telegram side of the bot: the `Messenger` seam the daily workflow talks to, its
//! teloxide-backed implementation, and the narrowing of teloxide updates into domain ones.
//!
//! Errors are rendered to text with the bot token masked, so they are safe to log.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::{
  payloads::setters::*,
  requests::Requester,
  types::{
    AllowedUpdate, ChatId, InputFile, LinkPreviewOptions, MediaKind, MediaPhoto, Message, MessageCommon, MessageEntity,
    MessageEntityKind, MessageId as TgMessageId, MessageKind, ReactionType, ThreadId as TgThreadId,
    Update as TgUpdate, UpdateKind, User,
  },
  update_listeners::Polling,
  Bot, RequestError,
};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::TelegramConfig;
use crate::domain::{IncomingMessage, MessageId, Reaction, ReplyTo, Sender, ThreadId, Update, UserId};

const TOKEN_MASK: &str = "<token>";

#[derive(Debug, Error)]
pub enum TelegramError {
  #[error("{method}: {message}")]
  Request { method: &'static str, message: String },
  #[error("{method}: api error: {description}")]
  Api { method: &'static str, description: String },
  #[error("client setup: {0}")]
  Setup(String),
}

/// Outbound chat operations. `TelegramClient` is the production implementation.
#[async_trait]
pub trait Messenger: Send + Sync {
  /// User id of the bot itself, used to recognise replies to its own posts.
  fn bot_id(&self) -> UserId;

  /// Post `header`, a newline, then `link` hidden under a spoiler.
  async fn send_spoiler_link(&self, thread_id: ThreadId, header: &str, link: &str) -> Result<MessageId, TelegramError>;

  async fn send_sticker(&self, thread_id: ThreadId, sticker_id: &str) -> Result<MessageId, TelegramError>;

  async fn pin(&self, message_id: MessageId) -> Result<(), TelegramError>;

  async fn unpin(&self, message_id: MessageId) -> Result<(), TelegramError>;

  async fn set_reaction(&self, message_id: MessageId, reaction: Reaction) -> Result<(), TelegramError>;
}

#[derive(Clone)]
pub struct TelegramClient {
  bot: Bot,
  chat_id: ChatId,
  bot_id: UserId,
}

fn mask_token(text: String, token: &str) -> String {
  if token.is_empty() {
    text
  } else {
    text.replace(token, TOKEN_MASK)
  }
}

fn request_error(token: &str, method: &'static str, e: RequestError) -> TelegramError {
  match e {
    RequestError::Api(api) => TelegramError::Api { method, description: mask_token(api.to_string(), token) },
    other => TelegramError::Request { method, message: mask_token(other.to_string(), token) },
  }
}

/// Message text and the spoiler entity covering the link. Offsets are UTF-16 code units.
fn spoiler_payload(header: &str, link: &str) -> (String, MessageEntity) {
  let text = format!("{}\n{}", header, link);
  let entity = MessageEntity::new(
    MessageEntityKind::Spoiler,
    header.encode_utf16().count() + 1,
    link.encode_utf16().count(),
  );
  (text, entity)
}

fn user_id(u: &User) -> UserId {
  u.id.0 as UserId
}

fn incoming(msg: &Message) -> IncomingMessage {
  let has_media_spoiler = matches!(
    &msg.kind,
    MessageKind::Common(MessageCommon {
      media_kind: MediaKind::Photo(MediaPhoto { has_media_spoiler: true, .. }),
      ..
    })
  );
  IncomingMessage {
    id: msg.id.0,
    thread_id: msg.thread_id.map(|t| t.0 .0),
    sender: msg.from.as_ref().map(|u| Sender { id: user_id(u), username: u.username.clone(), is_bot: u.is_bot }),
    reply_to: msg
      .reply_to_message()
      .map(|r| ReplyTo { id: r.id.0, sender_id: r.from.as_ref().map(user_id) }),
    text: msg.text().filter(|t| !t.is_empty()).map(str::to_owned),
    has_photo: msg.photo().is_some_and(|p| !p.is_empty()),
    has_media_spoiler,
    date: msg.date,
  }
}

/// Narrow a teloxide update to the domain shape. Only chat messages are kept.
pub fn domain_update(upd: &TgUpdate) -> Option<Update> {
  let UpdateKind::Message(msg) = &upd.kind else { return None };
  Some(Update { update_id: i64::from(upd.id.0), message: Some(incoming(msg)) })
}

impl TelegramClient {
  /// Build the bot and resolve its own identity via `getMe`.
  #[instrument(level = "info", skip_all, fields(chat_id = cfg.chat_id))]
  pub async fn connect(cfg: &TelegramConfig) -> Result<Self, TelegramError> {
    // The HTTP timeout has to outlast the long-poll wait.
    let client = teloxide::net::default_reqwest_settings()
      .timeout(Duration::from_secs(cfg.poll_timeout_secs + 15))
      .build()
      .map_err(|e| TelegramError::Setup(mask_token(e.to_string(), &cfg.token)))?;
    let api_url = url::Url::parse(&cfg.api_base_url)
      .map_err(|e| TelegramError::Setup(format!("api_base_url {:?}: {e}", cfg.api_base_url)))?;
    let bot = Bot::with_client(cfg.token.clone(), client).set_api_url(api_url);

    let me = bot.get_me().await.map_err(|e| request_error(&cfg.token, "getMe", e))?;
    let bot_id = user_id(&me.user);
    info!(target: "telegram", bot_id, username = ?me.user.username, "Telegram bot identity resolved");
    Ok(Self { bot, chat_id: ChatId(cfg.chat_id), bot_id })
  }

  pub fn bot(&self) -> Bot {
    self.bot.clone()
  }

  /// Long-polling listener for chat messages.
  pub fn polling(&self, timeout_secs: u64) -> Polling<Bot> {
    Polling::builder(self.bot.clone())
      .timeout(Duration::from_secs(timeout_secs))
      .allowed_updates(vec![AllowedUpdate::Message])
      .build()
  }

  fn err(&self, method: &'static str, e: RequestError) -> TelegramError {
    request_error(self.bot.token(), method, e)
  }
}

fn thread(thread_id: ThreadId) -> TgThreadId {
  TgThreadId(TgMessageId(thread_id))
}

// A preview card would show the hidden link.
fn no_preview() -> LinkPreviewOptions {
  LinkPreviewOptions {
    is_disabled: true,
    url: None,
    prefer_small_media: false,
    prefer_large_media: false,
    show_above_text: false,
  }
}

#[async_trait]
impl Messenger for TelegramClient {
  fn bot_id(&self) -> UserId {
    self.bot_id
  }

  #[instrument(level = "info", skip(self, header, link), fields(header_len = header.len()))]
  async fn send_spoiler_link(&self, thread_id: ThreadId, header: &str, link: &str) -> Result<MessageId, TelegramError> {
    let (text, entity) = spoiler_payload(header, link);
    let sent = self
      .bot
      .send_message(self.chat_id, text)
      .message_thread_id(thread(thread_id))
      .entities(vec![entity])
      .link_preview_options(no_preview())
      .await
      .map_err(|e| self.err("sendMessage", e))?;
    Ok(sent.id.0)
  }

  #[instrument(level = "info", skip(self))]
  async fn send_sticker(&self, thread_id: ThreadId, sticker_id: &str) -> Result<MessageId, TelegramError> {
    let sent = self
      .bot
      .send_sticker(self.chat_id, InputFile::file_id(sticker_id.to_owned()))
      .message_thread_id(thread(thread_id))
      .await
      .map_err(|e| self.err("sendSticker", e))?;
    Ok(sent.id.0)
  }

  #[instrument(level = "info", skip(self))]
  async fn pin(&self, message_id: MessageId) -> Result<(), TelegramError> {
    self
      .bot
      .pin_chat_message(self.chat_id, TgMessageId(message_id))
      .disable_notification(true)
      .await
      .map_err(|e| self.err("pinChatMessage", e))?;
    Ok(())
  }

  #[instrument(level = "info", skip(self))]
  async fn unpin(&self, message_id: MessageId) -> Result<(), TelegramError> {
    self
      .bot
      .unpin_chat_message(self.chat_id)
      .message_id(TgMessageId(message_id))
      .await
      .map_err(|e| self.err("unpinChatMessage", e))?;
    Ok(())
  }

  #[instrument(level = "info", skip(self))]
  async fn set_reaction(&self, message_id: MessageId, reaction: Reaction) -> Result<(), TelegramError> {
    self
      .bot
      .set_message_reaction(self.chat_id, TgMessageId(message_id))
      .reaction(vec![ReactionType::Emoji { emoji: reaction.emoji().to_owned() }])
      .await
      .map_err(|e| self.err("setMessageReaction", e))?;
    Ok(())
  }
}
