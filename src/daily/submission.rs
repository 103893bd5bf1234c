use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use super::{DailyService, Stream};
use crate::domain::{DayInfo, IncomingMessage, MessageId, Reaction, Solution, SolutionKey, Stats, Update, UserId};
use crate::error::{BotError, ResultExt};
use crate::store::{get_json_default, set_json, Tx};

static LC_SUBMISSION_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"https://leetcode\.com.*/submissions/(?:detail/)?(?P<submission_id>\d+)").unwrap()
});

/// Why a reply to a tracked post was turned down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
  /// Reply to an older daily, not the active one.
  StalePost,
  /// Neither a submission link nor a spoilered screenshot.
  BadContent,
  /// Active post has no day recorded.
  UnknownDay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
  /// Not a reply to one of this stream's posts; nothing done.
  Ignored,
  Rejected(Rejection),
  Accepted(SolutionKey),
}

/// Text must carry a submission link; photos must be hidden behind a spoiler.
fn content_acceptable(msg: &IncomingMessage) -> bool {
  match &msg.text {
    Some(text) if !text.is_empty() => LC_SUBMISSION_RE.is_match(text),
    _ if msg.has_photo => msg.has_media_spoiler,
    _ => false,
  }
}

impl DailyService {
  /// Judge a chat update as a submission for `stream` and record it when valid.
  ///
  /// Every reply to a tracked post gets exactly one reaction: ok when recorded,
  /// clown when rejected. Store failures surface as errors with no reaction.
  #[instrument(level = "info", skip(self, stream, update), fields(stream = %stream.name, update_id = update.update_id))]
  pub async fn on_update(&self, stream: &Stream, update: &Update) -> Result<Outcome, BotError> {
    let Some(msg) = &update.message else { return Ok(Outcome::Ignored) };
    let Some(sender) = &msg.sender else { return Ok(Outcome::Ignored) };
    let Some(reply_to) = &msg.reply_to else { return Ok(Outcome::Ignored) };
    if reply_to.sender_id != Some(self.messenger.bot_id()) {
      return Ok(Outcome::Ignored);
    }

    let mut tx = self.store.begin().await.context("begin")?;
    let verdict = self.judge_in_tx(tx.as_mut(), stream, update, msg, sender.id, reply_to.id).await?;
    match verdict {
      Outcome::Ignored => {
        debug!(target: "daily", reply_to = reply_to.id, "Reply to an untracked message");
      }
      Outcome::Rejected(reason) => {
        drop(tx);
        info!(target: "daily", user_id = sender.id, reply_to = reply_to.id, ?reason, "Submission rejected");
        self.messenger.set_reaction(msg.id, Reaction::Clown).await.context("set clown reaction")?;
      }
      Outcome::Accepted(key) => {
        tx.commit().await.context("commit")?;
        info!(target: "daily", user_id = key.user_id, day_idx = key.day_idx, "Submission recorded");
        self.messenger.set_reaction(msg.id, Reaction::Ok).await.context("set ok reaction")?;
      }
    }
    Ok(verdict)
  }

  async fn judge_in_tx(
    &self,
    tx: &mut dyn Tx,
    stream: &Stream,
    update: &Update,
    msg: &IncomingMessage,
    user_id: UserId,
    reply_to: MessageId,
  ) -> Result<Outcome, BotError> {
    let keys = &stream.keys;
    let pinned: Vec<MessageId> = get_json_default(tx, &keys.pinned_messages, Vec::new()).context("get pinned ids")?;
    if !pinned.contains(&reply_to) {
      return Ok(Outcome::Ignored);
    }
    if pinned.last() != Some(&reply_to) {
      return Ok(Outcome::Rejected(Rejection::StalePost));
    }
    if !content_acceptable(msg) {
      return Ok(Outcome::Rejected(Rejection::BadContent));
    }

    let day_infos: BTreeMap<MessageId, DayInfo> =
      get_json_default(tx, &keys.pinned_to_day_info, BTreeMap::new()).context("get msg to day info")?;
    let Some(day) = day_infos.get(&reply_to) else {
      warn!(target: "daily", stream = %stream.name, message_id = reply_to, "Active post has no day info");
      return Ok(Outcome::Rejected(Rejection::UnknownDay));
    };

    let mut stats: Stats = get_json_default(tx, &keys.stats, Stats::default()).context("get solutions")?;
    let key = SolutionKey { day_idx: day.day_idx, user_id };
    stats.solutions.insert(key, Solution { update: update.clone() });
    set_json(tx, &keys.stats, &stats).context("set solutions")?;
    Ok(Outcome::Accepted(key))
  }
}
