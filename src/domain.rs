//! Domain models: inbound chat updates, reactions, and the records persisted per stream.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type MessageId = i32;
pub type UserId = i64;
pub type ThreadId = i32;

/// Feedback left on a submitter's message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
  Ok,
  Clown,
}

impl Reaction {
  pub fn emoji(self) -> &'static str {
    match self {
      Reaction::Ok => "👌",
      Reaction::Clown => "🤡",
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sender {
  pub id: UserId,
  #[serde(default)] pub username: Option<String>,
  #[serde(default)] pub is_bot: bool,
}

/// The message a reply points at.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReplyTo {
  pub id: MessageId,
  #[serde(default)] pub sender_id: Option<UserId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IncomingMessage {
  pub id: MessageId,
  #[serde(default)] pub thread_id: Option<ThreadId>,
  #[serde(default)] pub sender: Option<Sender>,
  #[serde(default)] pub reply_to: Option<ReplyTo>,
  #[serde(default)] pub text: Option<String>,
  #[serde(default)] pub has_photo: bool,
  #[serde(default)] pub has_media_spoiler: bool,
  pub date: DateTime<Utc>,
}

/// One inbound chat update, already narrowed to what the bot features look at.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Update {
  pub update_id: i64,
  #[serde(default)] pub message: Option<IncomingMessage>,
}

/// Which day a published post stands for.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DayInfo {
  pub day_idx: i64,
  pub published_at: DateTime<Utc>,
}

/// Identity of one submission: persisted as `"{day_idx}|{user_id}"` so it can key a JSON map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SolutionKey {
  pub day_idx: i64,
  pub user_id: UserId,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseSolutionKeyError(String);

impl fmt::Display for ParseSolutionKeyError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "invalid solution key {:?}", self.0)
  }
}

impl std::error::Error for ParseSolutionKeyError {}

impl fmt::Display for SolutionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}|{}", self.day_idx, self.user_id)
  }
}

impl FromStr for SolutionKey {
  type Err = ParseSolutionKeyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let err = || ParseSolutionKeyError(s.to_string());
    let (day, user) = s.split_once('|').ok_or_else(err)?;
    if user.contains('|') {
      return Err(err());
    }
    Ok(SolutionKey {
      day_idx: day.parse().map_err(|_| err())?,
      user_id: user.parse().map_err(|_| err())?,
    })
  }
}

impl Serialize for SolutionKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for SolutionKey {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

/// The update that was accepted as a solution, kept for audit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Solution {
  pub update: Update,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Stats {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub solutions: BTreeMap<SolutionKey, Solution>,
}
