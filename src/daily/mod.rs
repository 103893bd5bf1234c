//! Daily-challenge workflow: publishing today's problem and tracking submissions.
//!
//! Each stream keeps three keys in the shared store:
//!   - `boardwhite:{name}:pinned_messages`: every post ever published, oldest
//!     first; the last one is the active post
//!   - `boardwhite:{name}:pinned_to_stats_day_info`: post id -> day it stands for
//!   - `boardwhite:{name}:stats`: accepted submissions keyed by `day|user`
//!
//! All reads and writes for one operation happen inside a single store transaction.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::config::BotConfig;
use crate::domain::{DayInfo, MessageId, Stats, ThreadId};
use crate::error::{BotError, ResultExt};
use crate::store::{get_json_default, Store};
use crate::telegram::Messenger;

mod publish;
mod submission;

pub(crate) struct StreamKeys {
  pub pinned_messages: String,
  pub pinned_to_day_info: String,
  pub stats: String,
}

impl StreamKeys {
  fn for_stream(name: &str) -> Self {
    Self {
      pinned_messages: format!("boardwhite:{name}:pinned_messages"),
      pinned_to_day_info: format!("boardwhite:{name}:pinned_to_stats_day_info"),
      stats: format!("boardwhite:{name}:stats"),
    }
  }
}

/// How the companion sticker of a daily post is chosen.
#[derive(Clone, Debug)]
pub struct StickerPolicy {
  pub pool: Vec<String>,
  pub fixed: Option<String>,
  pub fixed_groups: Vec<String>,
}

impl StickerPolicy {
  /// Fixed sticker for the configured groups, otherwise a uniform pick from the pool.
  pub fn pick(&self, group: &str) -> Result<String, BotError> {
    if let Some(fixed) = &self.fixed {
      if self.fixed_groups.iter().any(|g| g == group) {
        return Ok(fixed.clone());
      }
    }
    self.pool.choose(&mut rand::thread_rng()).cloned().ok_or(BotError::NoStickers)
  }
}

/// One independently tracked daily flow.
pub struct Stream {
  pub name: String,
  pub title: String,
  pub thread_id: ThreadId,
  pub start_date: DateTime<Utc>,
  pub catalog: Arc<Catalog>,
  pub stickers: StickerPolicy,
  pub(crate) keys: StreamKeys,
}

impl Stream {
  pub fn new(
    name: impl Into<String>,
    title: impl Into<String>,
    thread_id: ThreadId,
    start_date: DateTime<Utc>,
    catalog: Arc<Catalog>,
    stickers: StickerPolicy,
  ) -> Self {
    let name = name.into();
    let keys = StreamKeys::for_stream(&name);
    Self { name, title: title.into(), thread_id, start_date, catalog, stickers, keys }
  }
}

/// What the admin endpoint reports about a stream.
#[derive(Debug, Serialize, PartialEq)]
pub struct StreamStatus {
  pub stream: String,
  pub active_message_id: Option<MessageId>,
  pub active_day: Option<DayInfo>,
  pub published_posts: usize,
  pub submissions: usize,
  pub active_day_solvers: usize,
}

pub struct DailyService {
  store: Arc<dyn Store>,
  messenger: Arc<dyn Messenger>,
  streams: Vec<Arc<Stream>>,
}

impl DailyService {
  pub fn new(store: Arc<dyn Store>, messenger: Arc<dyn Messenger>, streams: Vec<Arc<Stream>>) -> Self {
    Self { store, messenger, streams }
  }

  /// Build streams from config, loading each catalog once per distinct source.
  pub fn from_config(cfg: &BotConfig, store: Arc<dyn Store>, messenger: Arc<dyn Messenger>) -> Result<Self, BotError> {
    let mut catalogs: BTreeMap<&str, Arc<Catalog>> = BTreeMap::new();
    let mut streams = Vec::with_capacity(cfg.streams.len());
    for s in &cfg.streams {
      let catalog = if let Some(c) = catalogs.get(s.catalog.as_str()).cloned() {
        c
      } else {
        let c = Arc::new(Catalog::load(&s.catalog).context(format!("load catalog for {}", s.name))?);
        catalogs.insert(s.catalog.as_str(), c.clone());
        c
      };
      let stickers = StickerPolicy {
        pool: cfg.sticker_pool(s).to_vec(),
        fixed: cfg.stickers.dp.clone(),
        fixed_groups: cfg.stickers.dp_groups.clone(),
      };
      streams.push(Arc::new(Stream::new(&s.name, &s.title, s.thread_id, s.start_date, catalog, stickers)));
    }
    Ok(Self::new(store, messenger, streams))
  }

  pub fn streams(&self) -> &[Arc<Stream>] {
    &self.streams
  }

  pub fn stream(&self, name: &str) -> Result<&Arc<Stream>, BotError> {
    self.streams.iter().find(|s| s.name == name).ok_or_else(|| BotError::UnknownStream(name.to_string()))
  }

  /// Read-only snapshot of a stream's bookkeeping.
  pub async fn status(&self, stream: &Stream) -> Result<StreamStatus, BotError> {
    let tx = self.store.begin().await.context("begin")?;
    let pinned: Vec<MessageId> = get_json_default(tx.as_ref(), &stream.keys.pinned_messages, Vec::new()).context("get pinned ids")?;
    let day_infos: BTreeMap<MessageId, DayInfo> =
      get_json_default(tx.as_ref(), &stream.keys.pinned_to_day_info, BTreeMap::new()).context("get msg to day info")?;
    let stats: Stats = get_json_default(tx.as_ref(), &stream.keys.stats, Stats::default()).context("get stats")?;

    let active_message_id = pinned.last().copied();
    let active_day = active_message_id.and_then(|id| day_infos.get(&id).cloned());
    let active_day_solvers = active_day
      .as_ref()
      .map_or(0, |d| stats.solutions.keys().filter(|k| k.day_idx == d.day_idx).count());

    Ok(StreamStatus {
      stream: stream.name.clone(),
      active_message_id,
      active_day,
      published_posts: pinned.len(),
      submissions: stats.solutions.len(),
      active_day_solvers,
    })
  }
}
