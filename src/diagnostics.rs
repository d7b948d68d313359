//! Periodic connection statistics logging

use std::sync::Weak;
use std::time::Duration;

use sqlx_sqlite_conn_mgr::SqliteDatabase;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::key::VersionedKey;

/// How often open connection counts are logged.
pub const STAT_COLLECTION_INTERVAL: Duration = Duration::from_secs(10);

/// Background task logging a database's open connection count.
///
/// Holds only a weak reference, so it never keeps a released database alive.
pub(crate) struct StatsSampler {
   stop: oneshot::Sender<()>,
   task: JoinHandle<()>,
}

impl StatsSampler {
   pub(crate) fn spawn(key: VersionedKey, database: Weak<SqliteDatabase>, period: Duration) -> Self {
      let (stop, mut stopped) = oneshot::channel::<()>();

      let task = tokio::spawn(async move {
         let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
         ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

         loop {
            tokio::select! {
               _ = &mut stopped => break,
               _ = ticker.tick() => {
                  let Some(database) = database.upgrade() else {
                     break;
                  };
                  debug!(
                     key = %key,
                     open_connections = database.stats().open_connections,
                     "Current number of open DB connections"
                  );
               }
            }
         }

         debug!(key = %key, "Stopped DB connection statistics");
      });

      Self { stop, task }
   }

   /// Signal the task to stop. The returned handle resolves once it has.
   pub(crate) fn stop(self) -> JoinHandle<()> {
      let _ = self.stop.send(());
      self.task
   }

   #[cfg(test)]
   fn is_finished(&self) -> bool {
      self.task.is_finished()
   }
}
