//! Retention sweeper for per-request ingestion folders.
//!
//! Every cycle walks the immediate children of the temporary base directory.
//! Folders older than the retention threshold get their repository recorded in
//! the history file (when a `owner-repo.txt` marker is present) and are then
//! removed. Recording and removal fail independently: a folder whose marker
//! cannot be read is still deleted, and a folder that cannot be deleted is
//! simply reconsidered on the next cycle.

use std::fmt;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const MARKER_EXTENSION: &str = "txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Result of looking for a marker file inside a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerOutcome {
    Found(RepoId),
    NoMarker,
    /// A marker exists but its stem has no `-` to split on.
    NoSeparator(String),
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to list {}: {source}", path.display())]
    Enumerate { path: PathBuf, source: io::Error },
    #[error("failed to read marker files in {}: {source}", path.display())]
    Marker { path: PathBuf, source: io::Error },
    #[error("failed to append to history file {}: {source}", path.display())]
    History { path: PathBuf, source: io::Error },
    #[error("failed to delete {}: {source}", path.display())]
    Delete { path: PathBuf, source: io::Error },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub folders_seen: usize,
    pub folders_expired: usize,
    pub folders_deleted: usize,
    pub records_written: usize,
    pub failures: usize,
}

#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    base_dir: PathBuf,
    history_path: PathBuf,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(
        base_dir: PathBuf,
        history_path: PathBuf,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            base_dir,
            history_path,
            retention,
            interval,
        }
    }

    /// Starts the sweep loop on the runtime. The loop stops once `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> SweeperHandle {
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        SweeperHandle { cancel, task }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            stage = "sweeper",
            event = "sweeper.start",
            base_dir = %self.base_dir.display(),
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "retention sweeper started"
        );

        while !cancel.is_cancelled() {
            let cycle_start = Instant::now();
            match self.sweep_once(SystemTime::now(), &cancel).await {
                Ok(outcome) if outcome.folders_expired > 0 || outcome.failures > 0 => info!(
                    stage = "sweeper",
                    event = "sweeper.cycle.end",
                    result = "ok",
                    folders_seen = outcome.folders_seen,
                    folders_expired = outcome.folders_expired,
                    folders_deleted = outcome.folders_deleted,
                    records_written = outcome.records_written,
                    failures = outcome.failures,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "retention sweep completed"
                ),
                Ok(outcome) => debug!(
                    stage = "sweeper",
                    event = "sweeper.cycle.end",
                    result = "ok",
                    folders_seen = outcome.folders_seen,
                    "nothing to retire"
                ),
                Err(err) => error!(
                    stage = "sweeper",
                    event = "sweeper.cycle.end",
                    result = "fail",
                    duration_ms = cycle_start.elapsed().as_millis(),
                    error = %err,
                    "retention sweep failed"
                ),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(stage = "sweeper", event = "sweeper.stop", "retention sweeper stopped");
    }

    /// Runs one scan using `now` as the reference time for folder ages.
    ///
    /// Only enumeration of the base directory can fail the whole scan; per-folder
    /// failures are reported and counted in [`SweepOutcome::failures`].
    pub async fn sweep_once(
        &self,
        now: SystemTime,
        cancel: &CancellationToken,
    ) -> Result<SweepOutcome, SweepError> {
        let mut outcome = SweepOutcome::default();

        let enumerate_err = |source| SweepError::Enumerate {
            path: self.base_dir.clone(),
            source,
        };

        if !fs::try_exists(&self.base_dir).await.map_err(enumerate_err)? {
            return Ok(outcome);
        }

        let mut entries = fs::read_dir(&self.base_dir).await.map_err(enumerate_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(enumerate_err)? {
            if cancel.is_cancelled() {
                debug!(stage = "sweeper", event = "sweeper.cycle.cancelled", "sweep interrupted");
                break;
            }

            let folder = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(folder = %folder.display(), error = %err, "failed to stat folder");
                    outcome.failures += 1;
                    continue;
                }
            };
            if !metadata.is_dir() {
                continue;
            }

            outcome.folders_seen += 1;
            if !is_expired(&metadata, now, self.retention) {
                continue;
            }

            outcome.folders_expired += 1;
            self.retire_folder(&folder, &mut outcome).await;
        }

        Ok(outcome)
    }

    async fn retire_folder(&self, folder: &Path, outcome: &mut SweepOutcome) {
        match self.record_history(folder).await {
            Ok(MarkerOutcome::Found(repo)) => {
                outcome.records_written += 1;
                debug!(folder = %folder.display(), repo = %repo, "recorded retired repository");
            }
            Ok(MarkerOutcome::NoMarker) => {
                debug!(folder = %folder.display(), "no marker file, skipping history");
            }
            Ok(MarkerOutcome::NoSeparator(name)) => {
                debug!(folder = %folder.display(), marker = %name, "marker has no owner separator");
            }
            Err(err) => {
                warn!(folder = %folder.display(), error = %err, "failed to record repository");
                outcome.failures += 1;
            }
        }

        match fs::remove_dir_all(folder).await {
            Ok(()) => outcome.folders_deleted += 1,
            Err(source) => {
                let err = SweepError::Delete {
                    path: folder.to_path_buf(),
                    source,
                };
                warn!(folder = %folder.display(), error = %err, "failed to delete folder");
                outcome.failures += 1;
            }
        }
    }

    async fn record_history(&self, folder: &Path) -> Result<MarkerOutcome, SweepError> {
        let marker = find_marker(folder).await?;
        if let MarkerOutcome::Found(repo) = &marker {
            append_history(&self.history_path, repo).await?;
        }
        Ok(marker)
    }
}

/// Owns the running sweep task.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Cancels the loop and waits up to `timeout` for it to finish.
    /// Returns `false` if the task had to be aborted or had panicked.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        let Self { cancel, mut task } = self;
        cancel.cancel();

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) if err.is_cancelled() => true,
            Ok(Err(err)) => {
                error!(stage = "shutdown", error = %err, "retention sweeper panicked");
                false
            }
            Err(_) => {
                warn!(
                    stage = "shutdown",
                    timeout_ms = timeout.as_millis(),
                    "retention sweeper did not stop in time, aborting"
                );
                task.abort();
                false
            }
        }
    }
}

fn is_expired(metadata: &Metadata, now: SystemTime, retention: Duration) -> bool {
    let Ok(created) = metadata.created().or_else(|_| metadata.modified()) else {
        return false;
    };
    now.duration_since(created)
        .map(|age| age > retention)
        .unwrap_or(false)
}

/// Path of the lexicographically first `*.txt` file in `folder`, if any.
pub async fn marker_path(folder: &Path) -> io::Result<Option<PathBuf>> {
    let mut markers = Vec::new();
    let mut entries = fs::read_dir(folder).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(MARKER_EXTENSION) {
            markers.push(path);
        }
    }
    Ok(markers.into_iter().min())
}

async fn find_marker(folder: &Path) -> Result<MarkerOutcome, SweepError> {
    let marker = marker_path(folder)
        .await
        .map_err(|source| SweepError::Marker {
            path: folder.to_path_buf(),
            source,
        })?;

    let Some(stem) = marker
        .as_deref()
        .and_then(|path| path.file_stem())
        .and_then(|stem| stem.to_str())
    else {
        return Ok(MarkerOutcome::NoMarker);
    };

    Ok(match parse_marker_stem(stem) {
        Some(repo) => MarkerOutcome::Found(repo),
        None => MarkerOutcome::NoSeparator(stem.to_string()),
    })
}

/// `owner-repo` → (`owner`, `repo`), splitting on the first `-` only.
pub fn parse_marker_stem(stem: &str) -> Option<RepoId> {
    let (owner, repo) = stem.split_once('-')?;
    Some(RepoId {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

async fn append_history(path: &Path, repo: &RepoId) -> Result<(), SweepError> {
    let history_err = |source| SweepError::History {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(history_err)?;
    file.write_all(format!("{repo}\n").as_bytes())
        .await
        .map_err(history_err)?;
    file.flush().await.map_err(history_err)?;
    Ok(())
}
