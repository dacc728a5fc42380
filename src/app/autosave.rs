use tokio::{
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::scheduler::SaveScheduler;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Periodic save through the shared scheduler, so it can never overlap an
/// explicit save. Ticks with nothing new to write are skipped.
pub struct AutoSaver {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl AutoSaver {
    pub fn start(scheduler: SaveScheduler, interval: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(autosave_loop(scheduler, interval, cancel_token.clone()));
        Self {
            cancel_token,
            handle,
        }
    }

    pub async fn stop(self) {
        self.cancel_token.cancel();
        if let Err(err) = self.handle.await {
            log_warn!("autosave task ended abnormally: {err}");
        }
    }
}

async fn autosave_loop(scheduler: SaveScheduler, interval: Duration, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the session was just loaded.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(outcome) = scheduler.save_if_dirty().await else {
                    continue;
                };
                if let Some(warning) = outcome.warning() {
                    log_warn!("autosave: {warning}");
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("autosave loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        history::History,
        models::Session,
        persistence::{MemoryKvStore, PersistenceGateway, StorageKeys},
        store::SessionStore,
        workspace::Workspace,
    };
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn saves_changed_sessions_until_stopped() {
        let workspace = Arc::new(Mutex::new(Workspace::new(
            SessionStore::new(Session::new()),
            History::default(),
        )));
        let gateway = Arc::new(PersistenceGateway::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(MemoryKvStore::new()),
            StorageKeys::default(),
        ));
        let scheduler = SaveScheduler::new(workspace.clone(), gateway);

        let saver = AutoSaver::start(scheduler.clone(), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(10)).await;
        workspace.lock().await.switch_location("box 1").unwrap();

        // Tick at 30s writes the change; 60s has nothing new.
        tokio::time::sleep(Duration::from_secs(55)).await;
        assert_eq!(scheduler.completed_saves(), 1);

        workspace.lock().await.switch_location("box 2").unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        saver.stop().await;
        assert_eq!(scheduler.completed_saves(), 2);

        workspace.lock().await.switch_location("box 3").unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(scheduler.completed_saves(), 2);
    }
}
