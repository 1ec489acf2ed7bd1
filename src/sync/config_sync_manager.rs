use super::artifact::{ConfigArtifact, TempArtifact};
use super::config_packer::ConfigPacker;
use crate::error::{SemLayerError, SemResult};
use crate::remote::RemoteOperations;
use crate::session::SessionContext;
use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Stages of a push or pull run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Packaging,
    Uploading,
    Fetching,
    Unpacking,
    Done,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Packaging => "packaging",
            SyncPhase::Uploading => "uploading",
            SyncPhase::Fetching => "fetching",
            SyncPhase::Unpacking => "unpacking",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub file_count: usize,
    pub archive_size: u64,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub file_count: usize,
    pub bytes_fetched: usize,
    pub version: Option<String>,
}

/// Push, pull and backfill for one local semantic-layer directory.
///
/// Each call is an independent run; nothing is carried over between runs.
pub struct ConfigSyncManager<R: RemoteOperations> {
    remote: R,
    packer: ConfigPacker,
    local_root: PathBuf,
    temp_dir: PathBuf,
}

impl<R: RemoteOperations> ConfigSyncManager<R> {
    pub fn new(session: &SessionContext, remote: R) -> Self {
        Self::with_paths(remote, session.local_root(), session.temp_dir())
    }

    pub fn with_paths(remote: R, local_root: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            packer: ConfigPacker::new(),
            local_root: local_root.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn push(&self, version: Option<&str>) -> SemResult<PushReport> {
        self.push_with_progress(version, |_| {})
    }

    /// Pack the local root into temporary storage and upload it.
    ///
    /// The temporary artifact is removed before this returns, on success and on
    /// failure. A failed removal is logged and never replaces the run's result.
    pub fn push_with_progress<F>(&self, version: Option<&str>, mut on_phase: F) -> SemResult<PushReport>
    where
        F: FnMut(SyncPhase),
    {
        let version = normalize_version(version);
        info!(
            "Pushing {} (version: {})",
            self.local_root.display(),
            version.unwrap_or("current")
        );

        let mut temp = match TempArtifact::create_in(&self.temp_dir) {
            Ok(temp) => temp,
            Err(err) => return Err(fail(&mut on_phase, err)),
        };

        let outcome = self.pack_and_upload(&mut temp, version, &mut on_phase);

        let temp_path = temp.path().to_path_buf();
        if let Err(cleanup_err) = temp.release() {
            warn!(
                "Failed to remove temporary artifact {}: {}",
                temp_path.display(),
                cleanup_err
            );
        }

        match outcome {
            Ok(report) => {
                enter(&mut on_phase, SyncPhase::Done);
                Ok(report)
            }
            Err(err) => Err(fail(&mut on_phase, err)),
        }
    }

    fn pack_and_upload<F: FnMut(SyncPhase)>(
        &self,
        temp: &mut TempArtifact,
        version: Option<&str>,
        on_phase: &mut F,
    ) -> SemResult<PushReport> {
        enter(on_phase, SyncPhase::Packaging);
        let artifact_path = temp.path().to_path_buf();
        let summary = self.packer.pack_excluding(
            &self.local_root,
            temp.as_file_mut(),
            Some(&artifact_path),
        )?;
        let archive_size = temp
            .as_file_mut()
            .metadata()
            .map_err(|e| SemLayerError::io("Failed to stat packed artifact", temp.path(), e))?
            .len();

        let artifact = ConfigArtifact::new(temp.path(), archive_size, version.map(str::to_string));

        enter(on_phase, SyncPhase::Uploading);
        self.remote.upload_config(&artifact)?;

        Ok(PushReport {
            file_count: summary.file_count,
            archive_size,
            version: artifact.version().map(str::to_string),
        })
    }

    pub fn pull(&self, version: Option<&str>) -> SemResult<PullReport> {
        self.pull_with_progress(version, |_| {})
    }

    /// Fetch the current (or pinned) configuration and overwrite the local root with it.
    ///
    /// Nothing is written locally unless the whole archive was fetched.
    pub fn pull_with_progress<F>(&self, version: Option<&str>, mut on_phase: F) -> SemResult<PullReport>
    where
        F: FnMut(SyncPhase),
    {
        let version = normalize_version(version);
        info!(
            "Pulling into {} (version: {})",
            self.local_root.display(),
            version.unwrap_or("current")
        );

        enter(&mut on_phase, SyncPhase::Fetching);
        let fetched = match version {
            Some(v) => self.remote.fetch_config_by_version(v),
            None => self.remote.fetch_current_config(),
        };
        let bytes = fetched.map_err(|err| fail(&mut on_phase, err))?;

        enter(&mut on_phase, SyncPhase::Unpacking);
        let summary = self
            .packer
            .unpack(&bytes, &self.local_root)
            .map_err(|err| fail(&mut on_phase, err))?;

        enter(&mut on_phase, SyncPhase::Done);
        Ok(PullReport {
            file_count: summary.file_count,
            bytes_fetched: bytes.len(),
            version: version.map(str::to_string),
        })
    }

    /// Ask the server to recompute user-wide data for `date`.
    pub fn backfill(&self, date: NaiveDate, version: Option<&str>) -> SemResult<()> {
        let version = normalize_version(version);
        info!(
            "Triggering backfill for {} (version: {})",
            date,
            version.unwrap_or("current")
        );
        self.remote.trigger_backfill(date, version)
    }
}

fn normalize_version(version: Option<&str>) -> Option<&str> {
    version.filter(|v| !v.is_empty())
}

fn enter<F: FnMut(SyncPhase)>(on_phase: &mut F, phase: SyncPhase) {
    info!("Sync phase: {}", phase);
    on_phase(phase);
}

fn fail<F: FnMut(SyncPhase)>(on_phase: &mut F, err: SemLayerError) -> SemLayerError {
    warn!("Sync failed: {}", err);
    on_phase(SyncPhase::Failed);
    err
}
