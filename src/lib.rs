//! SemLayer Library
//!
//! Client side of the semantic-layer workflow: pack a local configuration
//! directory, push it to the query engine, pull snapshots back, and run the
//! handful of schema and chart operations the engine exposes.

pub mod commands;
pub mod config;
pub mod error;
pub mod interaction;
pub mod remote;
pub mod session;
pub mod sync;
pub mod utils;

pub use error::{ErrorCategory, RemoteOperationKind, SemLayerError, SemResult};
pub use remote::{QueryEngineClient, RemoteOperations};
pub use session::{SessionContext, Settings};
pub use sync::{ConfigPacker, ConfigSyncManager, SyncPhase};
