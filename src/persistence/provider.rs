use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};

use crate::db::Database;

/// String key-value storage the gateway writes the serialized session into.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// A single session document owned by the desktop shell.
#[async_trait]
pub trait SessionFileProvider: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<String>>;
    async fn save(&self, contents: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct SqliteKvStore {
    db: Database,
}

impl SqliteKvStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: PathBuf) -> Result<Self> {
        Ok(Self::new(Database::new(path)?))
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.db.get_value(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db.set_value(key, value).await
    }
}

/// Process-local store, used for headless hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON session file written with a temp file + rename so a crash mid-write
/// never leaves a truncated document behind.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| anyhow!("session path {} has no file name", self.path.display()))?;
        let mut temp_name = file_name.to_os_string();
        temp_name.push(".tmp");
        Ok(self.path.with_file_name(temp_name))
    }
}

#[async_trait]
impl SessionFileProvider for JsonFileProvider {
    async fn load(&self) -> Result<Option<String>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read session from {}", self.path.display()))?;

        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(contents))
    }

    async fn save(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let temp_path = self.temp_path()?;
        let mut file = fs::File::create(&temp_path)
            .await
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .with_context(|| format!("Failed to write session to {}", self.path.display()))
    }
}
