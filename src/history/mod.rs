//! Append-only, size-bounded history of invoke calls.
//!
//! Entries live in an in-memory ring (oldest evicted beyond
//! `max_entries`) and, when a file is configured, are appended to it as
//! JSON lines. On [`HistoryLedger::open`] the ring is rehydrated from the
//! file's tail; lines that fail to parse are skipped.
//!
//! Persistence failures surface as `Err` from [`HistoryLedger::record`]
//! after the in-memory append already happened, so callers can report them
//! without changing the outcome they are recording.

mod entry;

pub use entry::{HistoryEntry, Outcome, RequestSnapshot, ResponseSnapshot};

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Result;
use crate::config::ServerConfig;

/// Ledger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub max_entries: usize,
    /// JSON-lines file; `None` keeps history in memory only.
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            path: None,
        }
    }
}

impl From<&ServerConfig> for HistoryConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            enabled: server.history_enabled,
            max_entries: server.history_max_entries,
            path: server.history_path(),
        }
    }
}

/// In-memory ring plus optional append-only file.
pub struct HistoryLedger {
    config: HistoryConfig,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl HistoryLedger {
    /// A ledger that records nothing.
    pub fn disabled() -> Self {
        Self::with_entries(
            HistoryConfig {
                enabled: false,
                ..Default::default()
            },
            VecDeque::new(),
        )
    }

    /// Memory-only ledger bounded to `max_entries`.
    pub fn in_memory(max_entries: usize) -> Self {
        Self::with_entries(
            HistoryConfig {
                enabled: true,
                max_entries,
                path: None,
            },
            VecDeque::new(),
        )
    }

    /// Build a ledger, rehydrating from the configured file if it exists.
    pub async fn open(config: HistoryConfig) -> Result<Self> {
        let entries = match (&config.path, config.enabled) {
            (Some(path), true) => load_tail(path, config.max_entries).await?,
            _ => VecDeque::new(),
        };
        if !entries.is_empty() {
            info!(entries = entries.len(), "rehydrated history");
        }
        Ok(Self::with_entries(config, entries))
    }

    fn with_entries(config: HistoryConfig, entries: VecDeque<HistoryEntry>) -> Self {
        Self {
            config,
            entries: Mutex::new(entries),
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Append an entry. No-op when disabled.
    ///
    /// The in-memory append always happens first; an `Err` only means the
    /// file append failed.
    pub async fn record(&self, entry: HistoryEntry) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let line = match &self.config.path {
            Some(_) => Some(serde_json::to_string(&entry)?),
            None => None,
        };

        // held across the file append so lines never interleave
        let mut entries = self.entries.lock().await;
        entries.push_back(entry);
        while entries.len() > self.config.max_entries {
            entries.pop_front();
        }

        if let (Some(path), Some(line)) = (&self.config.path, line) {
            append_line(path, &line).await?;
        }
        Ok(())
    }

    /// The `n` most recent entries, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().await;
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Every entry held in memory, oldest first.
    pub async fn all(&self) -> Vec<HistoryEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop all entries and truncate the backing file.
    pub async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        if let Some(path) = &self.config.path {
            if tokio::fs::try_exists(path).await? {
                tokio::fs::write(path, b"").await?;
            }
        }
        Ok(())
    }
}

async fn load_tail(path: &Path, max_entries: usize) -> Result<VecDeque<HistoryEntry>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(VecDeque::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = VecDeque::new();
    let mut skipped = 0usize;
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<HistoryEntry>(line) {
            Ok(entry) => {
                entries.push_back(entry);
                if entries.len() > max_entries {
                    entries.pop_front();
                }
            }
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(path = %path.display(), skipped, "skipped unparseable history lines");
    }
    Ok(entries)
}

async fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
