use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::{DailyService, Stream};
use crate::catalog::CatalogError;
use crate::day::day_index;
use crate::domain::{DayInfo, MessageId};
use crate::error::{BotError, ResultExt};
use crate::store::{get_json_default, set_json, Tx};

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Published {
  pub message_id: MessageId,
  pub day_idx: i64,
}

struct PublishReq<'a> {
  day_idx: i64,
  header: String,
  links: String,
  sticker_id: String,
  now: DateTime<Utc>,
  stream: &'a Stream,
}

impl DailyService {
  /// Post today's question for `stream`, pin it in place of the previous post and
  /// remember which day the new post stands for.
  #[instrument(level = "info", skip(self, stream), fields(stream = %stream.name))]
  pub async fn publish_daily(&self, stream: &Stream, now: DateTime<Utc>) -> Result<Published, BotError> {
    let total = stream.catalog.total();
    let day_idx = day_index(now, stream.start_date, total);
    let (group, question) = stream
      .catalog
      .locate(day_idx as usize)
      .ok_or(CatalogError::OutOfRange { idx: day_idx as usize, total })
      .context("locate question")?;

    let req = PublishReq {
      day_idx,
      header: format!("{}: {} [{} / {}]", stream.title, group.name, day_idx + 1, total),
      links: question.links_text(),
      sticker_id: stream.stickers.pick(&group.name).context("get sticker")?,
      now,
      stream,
    };

    let mut tx = self.store.begin().await.context("begin")?;
    let message_id = self.publish_in_tx(tx.as_mut(), &req).await.context("publish")?;
    if let Err(e) = tx.commit().await {
      error!(target: "daily", stream = %stream.name, message_id, day_idx, error = %e, "Daily was posted but its bookkeeping was not committed");
      return Err(e).context("commit");
    }

    info!(target: "daily", stream = %stream.name, message_id, day_idx, question = %question.name, difficulty = %question.difficulty, "Published daily");
    Ok(Published { message_id, day_idx })
  }

  async fn publish_in_tx(&self, tx: &mut dyn Tx, req: &PublishReq<'_>) -> Result<MessageId, BotError> {
    let keys = &req.stream.keys;
    let mut pinned: Vec<MessageId> = get_json_default(tx, &keys.pinned_messages, Vec::new())
      .context(format!("get key {}", keys.pinned_messages))?;
    if let Some(&active) = pinned.last() {
      if let Err(e) = self.messenger.unpin(active).await {
        warn!(target: "daily", stream = %req.stream.name, message_id = active, error = %e, "Unpin of previous daily failed");
      }
    }

    let message_id = self
      .messenger
      .send_spoiler_link(req.stream.thread_id, &req.header, &req.links)
      .await
      .context("send daily")?;
    self.messenger.send_sticker(req.stream.thread_id, &req.sticker_id).await.context("send sticker")?;
    self.messenger.pin(message_id).await.context("pin")?;

    pinned.push(message_id);
    set_json(tx, &keys.pinned_messages, &pinned).context(format!("set key {}", keys.pinned_messages))?;

    let mut day_infos: BTreeMap<MessageId, DayInfo> =
      get_json_default(tx, &keys.pinned_to_day_info, BTreeMap::new()).context("get msg to day info")?;
    day_infos.insert(message_id, DayInfo { day_idx: req.day_idx, published_at: req.now });
    set_json(tx, &keys.pinned_to_day_info, &day_infos).context("set msg to day info")?;

    Ok(message_id)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{atomic::Ordering, Arc};

  use chrono::Duration;

  use super::*;
  use crate::daily::tests::{epoch, fixture, THREAD};
  use crate::store::Store;
  use crate::testing::Call;

  async fn read_state(store: &dyn Store, stream: &Stream) -> (Vec<MessageId>, BTreeMap<MessageId, DayInfo>) {
    let tx = store.begin().await.unwrap();
    let pinned = get_json_default(tx.as_ref(), &stream.keys.pinned_messages, Vec::new()).unwrap();
    let infos = get_json_default(tx.as_ref(), &stream.keys.pinned_to_day_info, BTreeMap::new()).unwrap();
    (pinned, infos)
  }

  #[tokio::test]
  async fn publish_sends_pins_and_records_day() {
    let (svc, store, tg) = fixture();
    let stream = svc.stream("neetcode").unwrap().clone();
    let now = epoch() + Duration::hours(30);

    let published = svc.publish_daily(&stream, now).await.unwrap();
    assert_eq!(published.day_idx, 1);

    let calls = tg.calls();
    assert_eq!(
      calls,
      vec![
        Call::SpoilerLink {
          thread_id: THREAD,
          header: "NeetCode: Stack [2 / 3]".into(),
          link: "https://leetcode.com/problems/car-fleet/".into(),
          id: published.message_id,
        },
        Call::Sticker { thread_id: THREAD, sticker_id: "daily-sticker".into(), id: published.message_id + 1 },
        Call::Pin(published.message_id),
      ]
    );

    let (pinned, infos) = read_state(store.as_ref(), &stream).await;
    assert_eq!(pinned, vec![published.message_id]);
    assert_eq!(infos[&published.message_id], DayInfo { day_idx: 1, published_at: now });
  }

  #[tokio::test]
  async fn second_publish_unpins_previous_and_appends() {
    let (svc, store, tg) = fixture();
    let stream = svc.stream("neetcode").unwrap().clone();

    let first = svc.publish_daily(&stream, epoch()).await.unwrap();
    tg.clear();
    let second = svc.publish_daily(&stream, epoch() + Duration::days(1)).await.unwrap();

    let calls = tg.calls();
    assert_eq!(calls.first(), Some(&Call::Unpin(first.message_id)));
    assert_eq!(calls.last(), Some(&Call::Pin(second.message_id)));

    let (pinned, infos) = read_state(store.as_ref(), &stream).await;
    assert_eq!(pinned, vec![first.message_id, second.message_id]);
    assert_eq!(infos[&first.message_id].day_idx, 0);
    assert_eq!(infos[&second.message_id].day_idx, 1);
  }

  #[tokio::test]
  async fn dp_group_gets_fixed_sticker_and_free_link() {
    let (svc, _, tg) = fixture();
    let stream = svc.stream("neetcode").unwrap().clone();
    svc.publish_daily(&stream, epoch() + Duration::days(2)).await.unwrap();

    let calls = tg.calls();
    assert!(matches!(
      &calls[0],
      Call::SpoilerLink { header, link, .. }
        if header == "NeetCode: 1-D DP [3 / 3]"
          && link == "https://leetcode.com/problems/climbing-stairs/\nhttps://neetcode.io/problems/climbing-stairs"
    ));
    assert!(matches!(&calls[1], Call::Sticker { sticker_id, .. } if sticker_id == "dp-sticker"));
  }

  #[tokio::test]
  async fn unpin_failure_does_not_abort() {
    let (svc, store, tg) = fixture();
    let stream = svc.stream("neetcode").unwrap().clone();
    svc.publish_daily(&stream, epoch()).await.unwrap();
    tg.fail.unpin.store(true, Ordering::SeqCst);

    let second = svc.publish_daily(&stream, epoch() + Duration::days(1)).await.unwrap();
    let (pinned, _) = read_state(store.as_ref(), &stream).await;
    assert_eq!(pinned.len(), 2);
    assert_eq!(pinned.last(), Some(&second.message_id));
  }

  #[tokio::test]
  async fn pin_failure_rolls_back_bookkeeping() {
    let (svc, store, tg) = fixture();
    let stream = svc.stream("neetcode").unwrap().clone();
    let first = svc.publish_daily(&stream, epoch()).await.unwrap();
    tg.fail.pin.store(true, Ordering::SeqCst);

    let err = svc.publish_daily(&stream, epoch() + Duration::days(1)).await.unwrap_err();
    assert!(err.to_string().starts_with("publish: pin: telegram:"), "{err}");

    let (pinned, infos) = read_state(store.as_ref(), &stream).await;
    assert_eq!(pinned, vec![first.message_id]);
    assert_eq!(infos.len(), 1);
  }

  #[tokio::test]
  async fn sticker_failure_aborts_publish() {
    let (svc, store, tg) = fixture();
    let stream = svc.stream("neetcode").unwrap().clone();
    tg.fail.sticker.store(true, Ordering::SeqCst);

    assert!(svc.publish_daily(&stream, epoch()).await.is_err());
    let (pinned, _) = read_state(store.as_ref(), &stream).await;
    assert!(pinned.is_empty());
    assert!(!tg.calls().iter().any(|c| matches!(c, Call::Pin(_))));
  }

  #[tokio::test]
  async fn concurrent_publishes_each_append_once() {
    let (svc, store, tg) = fixture();
    let svc = Arc::new(svc);
    let stream = svc.stream("neetcode").unwrap().clone();

    let a = {
      let (svc, stream) = (svc.clone(), stream.clone());
      tokio::spawn(async move { svc.publish_daily(&stream, epoch()).await })
    };
    let b = {
      let (svc, stream) = (svc.clone(), stream.clone());
      tokio::spawn(async move { svc.publish_daily(&stream, epoch()).await })
    };
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    let (pinned, infos) = read_state(store.as_ref(), &stream).await;
    assert_eq!(pinned.len(), 2);
    assert_eq!(infos.len(), 2);
    // Whichever ran second unpinned exactly the first one's post.
    let unpins: Vec<_> = tg.calls().into_iter().filter(|c| matches!(c, Call::Unpin(_))).collect();
    assert_eq!(unpins, vec![Call::Unpin(pinned[0])]);
    assert!(pinned.contains(&a.message_id) && pinned.contains(&b.message_id));
  }
}
