//! Periodic refresh of the report list.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::models::report::Report;
use crate::store::{Persistence, Sourced};

pub type Snapshot = Option<Sourced<Vec<Report>>>;

/// Background task publishing a fresh report list every `period`.
///
/// The first fetch happens immediately. Dropping the feed stops the task.
pub struct ReportFeed {
    task: JoinHandle<()>,
}

impl ReportFeed {
    pub fn start(store: Arc<Persistence>, period: Duration) -> (Self, watch::Receiver<Snapshot>) {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match store.fetch_collection::<Report>().await {
                    Ok(snapshot) => {
                        debug!("[FEED] {} reports (remote: {})", snapshot.data.len(), snapshot.is_remote());
                        if tx.send(Some(snapshot)).is_err() {
                            info!("[FEED] No subscribers left, stopping");
                            break;
                        }
                    }
                    Err(err) => error!("[FEED] Refresh failed: {}", err),
                }
            }
        });
        info!("[FEED] Refreshing reports every {:?}", period);
        (Self { task }, rx)
    }
}

impl Drop for ReportFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}
