//! Query engine access.

pub mod client;
pub mod models;
pub mod request;

pub use client::{QueryEngineClient, RemoteOperations};
pub use models::{
    ChartRequest, ChartResult, ColumnDescriptor, DatabaseCredentials, DatasourceDescriptor,
};
pub use request::{RemoteRequest, RemoteResponse, RequestBody, ResponseKind};
