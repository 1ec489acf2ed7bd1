//! Query engine HTTP client
//!
//! `QueryEngineClient` is the only component that talks to the remote
//! service. Every call is one blocking round trip; there are no retries and
//! no token refresh. Transport failures, non-2xx answers and undecodable
//! bodies all come back as [`SemLayerError::RemoteOperation`].

use super::models::{
    ChartRequest, ChartResult, ColumnDescriptor, DatabaseCredentials, DatasourceDescriptor,
};
use super::request::{RemoteRequest, RemoteResponse, RequestBody, ResponseKind};
use crate::config::{API_ROOT_SEGMENTS, ARCHIVE_MIME_TYPE, UPLOAD_FIELD_NAME};
use crate::error::{RemoteOperationKind, SemLayerError, SemResult};
use crate::session::SessionContext;
use crate::sync::artifact::ConfigArtifact;
use chrono::NaiveDate;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

/// Operations the query engine exposes to this client.
///
/// Version-sensitive operations take the caller's version label and forward
/// it verbatim; `None` means the server's current configuration.
pub trait RemoteOperations {
    fn list_columns(&self, table: &str) -> SemResult<Vec<ColumnDescriptor>>;

    fn list_daily_datasources(
        &self,
        version: Option<&str>,
    ) -> SemResult<BTreeMap<String, DatasourceDescriptor>>;

    fn submit_chart(&self, request: &ChartRequest, version: Option<&str>) -> SemResult<ChartResult>;

    fn submit_db_auth(&self, credentials: &DatabaseCredentials) -> SemResult<()>;

    fn fetch_current_config(&self) -> SemResult<Vec<u8>>;

    fn fetch_config_by_version(&self, version: &str) -> SemResult<Vec<u8>>;

    /// Upload a packed artifact; its version label, if any, pins the upload.
    fn upload_config(&self, artifact: &ConfigArtifact) -> SemResult<()>;

    fn trigger_backfill(&self, date: NaiveDate, version: Option<&str>) -> SemResult<()>;
}

/// Authenticated blocking client for `{api}/api/v1/{appId}/...`.
#[derive(Clone)]
pub struct QueryEngineClient {
    http: Client,
    api_root: Url,
    token: String,
}

impl fmt::Debug for QueryEngineClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngineClient")
            .field("api_root", &self.api_root.as_str())
            .field("has_token", &!self.token.is_empty())
            .finish()
    }
}

impl QueryEngineClient {
    pub fn new(session: &SessionContext) -> SemResult<Self> {
        let http = Client::builder()
            .timeout(session.read_timeout())
            .user_agent(concat!("semlayer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                SemLayerError::configuration(format!("Failed to build HTTP client: {err}"), None)
            })?;

        let mut api_root = session.api_base_uri().clone();
        api_root
            .path_segments_mut()
            .map_err(|_| {
                SemLayerError::configuration(
                    format!("API URI cannot be a base: {}", session.api_base_uri()),
                    Some("api_uri"),
                )
            })?
            .pop_if_empty()
            .extend(API_ROOT_SEGMENTS)
            .push(session.app_id());

        debug!("Query engine client ready for {}", api_root);

        Ok(Self {
            http,
            api_root,
            token: session.bearer_token().to_string(),
        })
    }

    /// Root every request path is resolved against.
    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    fn endpoint(&self, segments: &[String]) -> Url {
        let mut url = self.api_root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// Perform one round trip and decode the response as `expect`.
    pub fn execute(&self, request: RemoteRequest, expect: ResponseKind) -> SemResult<RemoteResponse> {
        let RemoteRequest {
            operation,
            method,
            segments,
            body,
            headers,
        } = request;

        let url = self.endpoint(&segments);
        debug!("{} {} ({})", method, url, operation);

        let mut builder = self
            .http
            .request(method.clone(), url)
            .bearer_auth(&self.token);

        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match expect {
            ResponseKind::Json => builder.header(ACCEPT, "application/json"),
            ResponseKind::Bytes => builder.header(ACCEPT, "application/octet-stream"),
            ResponseKind::Empty => builder,
        };

        builder = match body {
            RequestBody::Empty if method == Method::GET => builder,
            RequestBody::Empty => builder.body(Vec::<u8>::new()),
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::MultipartFile { field, path, mime } => {
                let part = Part::file(&path)
                    .map_err(|err| SemLayerError::io("Failed to read artifact for upload", &path, err))?
                    .mime_str(&mime)
                    .map_err(|err| SemLayerError::transport(operation, err))?;
                builder.multipart(Form::new().part(field, part))
            }
        };

        let response = builder
            .send()
            .map_err(|err| SemLayerError::transport(operation, err))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                text
            };
            warn!("{} rejected with HTTP {}", operation, status.as_u16());
            return Err(SemLayerError::rejected(operation, status.as_u16(), message));
        }

        match expect {
            ResponseKind::Json => {
                let value: Value = response.json().map_err(|err| {
                    SemLayerError::remote(operation, format!("Malformed response body: {err}"))
                })?;
                Ok(RemoteResponse::Json(value))
            }
            ResponseKind::Bytes => {
                let bytes = response
                    .bytes()
                    .map_err(|err| SemLayerError::transport(operation, err))?;
                debug!("{} returned {} bytes", operation, bytes.len());
                Ok(RemoteResponse::Bytes(bytes.to_vec()))
            }
            ResponseKind::Empty => Ok(RemoteResponse::Empty),
        }
    }

    fn call_json<T: DeserializeOwned>(&self, request: RemoteRequest) -> SemResult<T> {
        let operation = request.operation;
        self.execute(request, ResponseKind::Json)?
            .into_typed(operation)
    }

    fn call_bytes(&self, request: RemoteRequest) -> SemResult<Vec<u8>> {
        let operation = request.operation;
        self.execute(request, ResponseKind::Bytes)?
            .into_bytes(operation)
    }

    fn call_void(&self, request: RemoteRequest) -> SemResult<()> {
        self.execute(request, ResponseKind::Empty).map(|_| ())
    }
}

fn to_json<T: serde::Serialize>(operation: RemoteOperationKind, body: &T) -> SemResult<Value> {
    serde_json::to_value(body).map_err(|err| {
        SemLayerError::remote(operation, format!("Failed to encode request body: {err}"))
    })
}

impl RemoteOperations for QueryEngineClient {
    fn list_columns(&self, table: &str) -> SemResult<Vec<ColumnDescriptor>> {
        self.call_json(RemoteRequest::get(
            RemoteOperationKind::ListColumns,
            &["datasources", table, "columns"],
        ))
    }

    fn list_daily_datasources(
        &self,
        version: Option<&str>,
    ) -> SemResult<BTreeMap<String, DatasourceDescriptor>> {
        self.call_json(
            RemoteRequest::get(
                RemoteOperationKind::ListDailyDatasources,
                &["datasources", "daily"],
            )
            .version(version),
        )
    }

    fn submit_chart(&self, request: &ChartRequest, version: Option<&str>) -> SemResult<ChartResult> {
        let operation = RemoteOperationKind::SubmitChart;
        self.call_json(
            RemoteRequest::post(operation, &["charts", "submit"])
                .json_body(to_json(operation, request)?)
                .version(version),
        )
    }

    fn submit_db_auth(&self, credentials: &DatabaseCredentials) -> SemResult<()> {
        let operation = RemoteOperationKind::SubmitDbAuth;
        self.call_void(
            RemoteRequest::post(operation, &["datasources-configure", "db-auth"])
                .json_body(to_json(operation, credentials)?),
        )
    }

    fn fetch_current_config(&self) -> SemResult<Vec<u8>> {
        self.call_bytes(RemoteRequest::get(
            RemoteOperationKind::FetchCurrentConfig,
            &["datasources", "current-config"],
        ))
    }

    fn fetch_config_by_version(&self, version: &str) -> SemResult<Vec<u8>> {
        self.call_bytes(RemoteRequest::get(
            RemoteOperationKind::FetchConfigByVersion,
            &["datasources", "config", version],
        ))
    }

    fn upload_config(&self, artifact: &ConfigArtifact) -> SemResult<()> {
        self.call_void(
            RemoteRequest::post(
                RemoteOperationKind::UploadConfig,
                &["datasources-configure", "config"],
            )
            .multipart_file(UPLOAD_FIELD_NAME, artifact.path(), ARCHIVE_MIME_TYPE)
            .version(artifact.version()),
        )?;
        info!("Config uploaded successfully ({} bytes)", artifact.size());
        Ok(())
    }

    fn trigger_backfill(&self, date: NaiveDate, version: Option<&str>) -> SemResult<()> {
        let day = date.format("%Y-%m-%d").to_string();
        self.call_void(
            RemoteRequest::post(
                RemoteOperationKind::TriggerBackfill,
                &["datasources", "backfill-userwide", day.as_str()],
            )
            .version(version),
        )
    }
}
