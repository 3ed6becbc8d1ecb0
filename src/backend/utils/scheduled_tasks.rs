use crate::backend::{
    database::FolioContext,
    utils::error::BackendResult,
};
use chrono::Utc;
use clokwerk::{ScheduleHandle, Scheduler, TimeUnits};
use log::{debug, error, info};
use std::time::Duration;

/// Starts background cleanup tasks. They stop when the returned handle is dropped.
pub fn start(context: FolioContext) -> ScheduleHandle {
    let mut scheduler = Scheduler::new();

    let ctx = context.clone();
    cleanup_sessions(&ctx).inspect_err(|e| error!("{e}")).ok();
    scheduler.every(1.hour()).run(move || {
        cleanup_sessions(&ctx).inspect_err(|e| error!("{e}")).ok();
    });

    scheduler.every(1.minute()).run(move || {
        purge_rate_limiter(&context);
    });

    scheduler.watch_thread(Duration::from_secs(10))
}

fn cleanup_sessions(context: &FolioContext) -> BackendResult<usize> {
    info!("Removing expired sessions");
    let removed = context.repo().delete_expired_sessions(Utc::now())?;
    info!("Removed {removed} expired sessions");
    Ok(removed)
}

fn purge_rate_limiter(context: &FolioContext) {
    let removed = context.rate_limiter.purge_stale();
    if removed > 0 {
        debug!("Purged {removed} stale rate limit entries");
    }
}
