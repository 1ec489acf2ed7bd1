//! Query engine wire types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One column of a warehouse table, as returned by `datasources/{table}/columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub id: String,
    pub data_type: String,
}

/// Server-managed datasource description.
///
/// Only the commonly used fields are typed; everything else is kept as-is so
/// newer server versions do not break deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Chart evaluation request. The query shape is owned by the server, so the
/// body is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartRequest(pub Value);

impl ChartRequest {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw).map(ChartRequest)
    }
}

/// Chart evaluation result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartResult(pub Value);

/// Database credentials registered through `datasources-configure/db-auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    #[serde(rename = "type")]
    pub database_type: String,
    #[serde(flatten)]
    pub properties: BTreeMap<String, String>,
}

impl DatabaseCredentials {
    pub fn new(database_type: impl Into<String>) -> Self {
        Self {
            database_type: database_type.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
