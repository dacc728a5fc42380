//! SQLite-backed key-value storage. One worker thread owns the connection;
//! async callers send it closures and await the reply on a oneshot.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod migrations;
mod repositories;

use migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum WorkerMessage {
    Run(Job),
    Stop,
}

/// Joins the worker when the last `Database` clone goes away.
struct Worker {
    jobs: mpsc::Sender<WorkerMessage>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        if let Err(err) = self.jobs.send(WorkerMessage::Stop) {
            error!("Failed to stop kv worker: {err}");
        }
        if let Err(err) = handle.join() {
            error!("kv worker panicked: {err:?}");
        }
    }
}

#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens (or creates) the database file and migrates it before returning.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<WorkerMessage>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let worker_path = path.clone();

        let thread = thread::Builder::new()
            .name("boxaudit-kv".into())
            .spawn(move || serve(worker_path, ready_tx, jobs_rx))
            .context("failed to spawn kv worker thread")?;

        ready_rx
            .recv()
            .context("kv worker exited before it was ready")??;
        info!("kv store ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `task` on the worker thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have been cancelled; nothing to report then.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .jobs
            .send(WorkerMessage::Run(job))
            .map_err(|_| anyhow!("kv worker is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("kv worker dropped the request"))?
    }
}

fn serve(path: PathBuf, ready: mpsc::Sender<Result<()>>, jobs: mpsc::Receiver<WorkerMessage>) {
    let mut conn = match open_connection(&path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Ok(message) = jobs.recv() {
        match message {
            WorkerMessage::Run(job) => job(&mut conn),
            WorkerMessage::Stop => break,
        }
    }
    info!("kv worker for {} stopped", path.display());
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    // Session saves are read back right away; FULL keeps them on disk first.
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("WAL unavailable for {}: {err}", path.display());
    }
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.busy_timeout(Duration::from_secs(2))?;

    run_migrations(&mut conn).context("failed to migrate kv schema")?;
    Ok(conn)
}
