//! Cron trigger for daily publishing (tokio-cron-scheduler, schedules in UTC).

use std::sync::Arc;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::BotConfig;
use crate::daily::DailyService;
use crate::error::BotError;

fn scheduler_err(what: &str, e: impl std::fmt::Debug) -> BotError {
  BotError::Scheduler(format!("{what}: {e:?}"))
}

/// Register one publish job per stream that has `publish_cron` set, then start.
pub async fn start_scheduler(cfg: &BotConfig, service: Arc<DailyService>) -> Result<JobScheduler, BotError> {
  let scheduler = JobScheduler::new().await.map_err(|e| scheduler_err("create scheduler", e))?;

  for s in &cfg.streams {
    let Some(cron) = s.publish_cron.clone() else { continue };
    let stream = service.stream(&s.name)?.clone();
    let svc = service.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
      let svc = svc.clone();
      let stream = stream.clone();
      Box::pin(async move {
        if let Err(e) = svc.publish_daily(&stream, Utc::now()).await {
          error!(target: "daily", stream = %stream.name, error = %e, "Scheduled daily publish failed");
        }
      })
    })
    .map_err(|e| scheduler_err(&format!("schedule {} ({cron})", s.name), e))?;

    scheduler.add(job).await.map_err(|e| scheduler_err("add job", e))?;
    info!(target: "daily", stream = %s.name, %cron, "Scheduled daily publish");
  }

  scheduler.start().await.map_err(|e| scheduler_err("start scheduler", e))?;
  Ok(scheduler)
}
