use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex as StdMutex, MutexGuard,
    },
};

use tokio::sync::Mutex;

use crate::{
    persistence::{PersistenceGateway, SaveOutcome},
    workspace::Workspace,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub type SaveFuture = Pin<Box<dyn Future<Output = SaveOutcome> + Send + 'static>>;

/// Both flags change under one lock so a request can never slip between the
/// end of a save and its follow-up check.
#[derive(Debug)]
struct SaveFlags {
    in_flight: bool,
    pending: bool,
    /// Revision of the last session that reached storage; `None` forces the
    /// next save.
    saved_revision: Option<u64>,
    last_outcome: Option<SaveOutcome>,
}

struct SaveState {
    flags: StdMutex<SaveFlags>,
    completed: AtomicU64,
}

impl SaveState {
    fn new() -> Self {
        Self {
            flags: StdMutex::new(SaveFlags {
                in_flight: false,
                pending: false,
                saved_revision: Some(0),
                last_outcome: None,
            }),
            completed: AtomicU64::new(0),
        }
    }

    fn flags(&self) -> MutexGuard<'_, SaveFlags> {
        match self.flags.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Claims the save slot, or queues a follow-up when it is taken.
    fn begin(&self) -> bool {
        let mut flags = self.flags();
        if flags.in_flight {
            flags.pending = true;
            false
        } else {
            flags.in_flight = true;
            true
        }
    }

    /// Releases the slot unless a follow-up was queued, in which case the
    /// slot stays claimed for it.
    fn finish(&self) -> bool {
        let mut flags = self.flags();
        if flags.pending {
            flags.pending = false;
            true
        } else {
            flags.in_flight = false;
            false
        }
    }

    fn remember(&self, revision: u64, outcome: &SaveOutcome) {
        self.completed.fetch_add(1, Ordering::AcqRel);
        let mut flags = self.flags();
        if outcome.is_persisted() {
            flags.saved_revision = Some(flags.saved_revision.map_or(revision, |saved| saved.max(revision)));
        }
        flags.last_outcome = Some(outcome.clone());
    }
}

/// Serializes saves: a request arriving while one is in flight is folded
/// into a single follow-up save that runs once the current one finishes.
#[derive(Clone)]
pub struct SaveScheduler {
    workspace: Arc<Mutex<Workspace>>,
    gateway: Arc<PersistenceGateway>,
    state: Arc<SaveState>,
}

impl SaveScheduler {
    /// The workspace is taken to match what storage already holds.
    pub fn new(workspace: Arc<Mutex<Workspace>>, gateway: Arc<PersistenceGateway>) -> Self {
        Self {
            workspace,
            gateway,
            state: Arc::new(SaveState::new()),
        }
    }

    pub fn gateway(&self) -> &Arc<PersistenceGateway> {
        &self.gateway
    }

    /// Saves the current session, or returns `Deferred` if a save is already
    /// running.
    pub fn request_save(&self) -> SaveFuture {
        let this = self.clone();
        Box::pin(async move { this.run_save().await })
    }

    /// Like [`request_save`](Self::request_save), but skips sessions that
    /// have not changed since they last reached storage.
    pub async fn save_if_dirty(&self) -> Option<SaveOutcome> {
        if !self.is_dirty().await {
            return None;
        }
        Some(self.request_save().await)
    }

    pub async fn is_dirty(&self) -> bool {
        let revision = self.workspace.lock().await.revision();
        self.state.flags().saved_revision != Some(revision)
    }

    /// Forgets what storage holds, e.g. after the loaded session was
    /// rewritten in memory.
    pub fn mark_dirty(&self) {
        self.state.flags().saved_revision = None;
    }

    pub fn is_saving(&self) -> bool {
        self.state.flags().in_flight
    }

    /// Number of saves that reached the gateway, whatever their outcome.
    pub fn completed_saves(&self) -> u64 {
        self.state.completed.load(Ordering::Acquire)
    }

    pub fn last_outcome(&self) -> Option<SaveOutcome> {
        self.state.flags().last_outcome.clone()
    }

    async fn run_save(&self) -> SaveOutcome {
        if !self.state.begin() {
            log_info!("save already in flight; queued one follow-up save");
            return SaveOutcome::Deferred;
        }

        let outcome = self.save_once().await;
        self.finish();
        outcome
    }

    fn follow_up(&self) -> SaveFuture {
        let this = self.clone();
        Box::pin(async move {
            let outcome = this.save_once().await;
            this.finish();
            outcome
        })
    }

    fn finish(&self) {
        if self.state.finish() {
            tokio::spawn(self.follow_up());
        }
    }

    async fn save_once(&self) -> SaveOutcome {
        let (session, revision) = {
            let workspace = self.workspace.lock().await;
            (workspace.session().clone(), workspace.revision())
        };
        let outcome = self.gateway.save(&session).await;
        if let Some(warning) = outcome.warning() {
            log_warn!("{warning}");
        }
        self.state.remember(revision, &outcome);
        outcome
    }
}
