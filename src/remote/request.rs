//! Request/response values shared by every remote operation.

use crate::config::APP_CONFIG_VERSION_HEADER;
use crate::error::{RemoteOperationKind, SemLayerError, SemResult};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;

/// Body of a remote request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Single-file multipart upload read from local storage.
    MultipartFile {
        field: String,
        path: PathBuf,
        mime: String,
    },
}

/// Shape the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Bytes,
    Empty,
}

/// A single call to the query engine. Built per call, never mutated after send.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub operation: RemoteOperationKind,
    pub method: Method,
    /// Path segments relative to `/api/v1/{appId}/`
    pub segments: Vec<String>,
    pub body: RequestBody,
    pub headers: Vec<(String, String)>,
}

impl RemoteRequest {
    pub fn new<S: AsRef<str>>(
        operation: RemoteOperationKind,
        method: Method,
        segments: &[S],
    ) -> Self {
        Self {
            operation,
            method,
            segments: segments.iter().map(|s| s.as_ref().to_string()).collect(),
            body: RequestBody::Empty,
            headers: Vec::new(),
        }
    }

    pub fn get<S: AsRef<str>>(operation: RemoteOperationKind, segments: &[S]) -> Self {
        Self::new(operation, Method::GET, segments)
    }

    pub fn post<S: AsRef<str>>(operation: RemoteOperationKind, segments: &[S]) -> Self {
        Self::new(operation, Method::POST, segments)
    }

    pub fn json_body(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart_file(
        mut self,
        field: impl Into<String>,
        path: impl Into<PathBuf>,
        mime: impl Into<String>,
    ) -> Self {
        self.body = RequestBody::MultipartFile {
            field: field.into(),
            path: path.into(),
            mime: mime.into(),
        };
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Pin the request to a configuration snapshot. `None` (or an empty label)
    /// leaves the header off so the server uses the current configuration.
    pub fn version(self, version: Option<&str>) -> Self {
        match version.filter(|v| !v.is_empty()) {
            Some(v) => self.header(APP_CONFIG_VERSION_HEADER, v),
            None => self,
        }
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Decoded response of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteResponse {
    Json(Value),
    Bytes(Vec<u8>),
    Empty,
}

impl RemoteResponse {
    pub fn into_typed<T: DeserializeOwned>(self, operation: RemoteOperationKind) -> SemResult<T> {
        match self {
            RemoteResponse::Json(value) => serde_json::from_value(value).map_err(|err| {
                SemLayerError::remote(operation, format!("Malformed response body: {err}"))
            }),
            other => Err(SemLayerError::remote(
                operation,
                format!("Expected a JSON response, got {}", other.kind_name()),
            )),
        }
    }

    pub fn into_bytes(self, operation: RemoteOperationKind) -> SemResult<Vec<u8>> {
        match self {
            RemoteResponse::Bytes(bytes) => Ok(bytes),
            other => Err(SemLayerError::remote(
                operation,
                format!("Expected a binary response, got {}", other.kind_name()),
            )),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            RemoteResponse::Json(_) => "JSON",
            RemoteResponse::Bytes(_) => "bytes",
            RemoteResponse::Empty => "an empty response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_header_only_when_present() {
        let pinned = RemoteRequest::get(RemoteOperationKind::ListDailyDatasources, &["datasources", "daily"])
            .version(Some("v7"));
        assert_eq!(pinned.header_value("appconfigversion"), Some("v7"));

        let current = RemoteRequest::get(RemoteOperationKind::ListDailyDatasources, &["datasources", "daily"])
            .version(None);
        assert!(current.headers.is_empty());

        let blank = RemoteRequest::get(RemoteOperationKind::ListDailyDatasources, &["datasources", "daily"])
            .version(Some(""));
        assert!(blank.headers.is_empty());
    }

    #[test]
    fn typed_decoding_failure_is_remote_error() {
        let response = RemoteResponse::Json(serde_json::json!({"unexpected": true}));
        let err = response
            .into_typed::<Vec<String>>(RemoteOperationKind::ListColumns)
            .unwrap_err();
        assert!(err.message().starts_with("Malformed response body"));
    }
}
