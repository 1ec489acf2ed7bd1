//! Packing, unpacking and push/pull orchestration for the local config directory.

pub mod artifact;
pub mod config_packer;
pub mod config_sync_manager;

pub use artifact::{ConfigArtifact, TempArtifact};
pub use config_packer::{ConfigPacker, PackSummary, UnpackSummary};
pub use config_sync_manager::{ConfigSyncManager, PullReport, PushReport, SyncPhase};
