//! Data-Source Registry (spec component D).
//!
//! Tracks the set of data sources the search orchestrator fans out to:
//! active/syncing/error state, connection config validation per type, and
//! the hot-path lookups (`getActive`, `getById`, `checkHealth`). Backed by
//! `dashmap::DashMap`, the same concurrent-map crate the processor's
//! in-flight query table uses (§4.F), rather than the teacher's
//! Postgres-backed `DatabaseManager` — sources here are registry metadata,
//! not the vector records `database::postgres_client` manages.

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    File,
    Database,
    Api,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    New,
    Active,
    Syncing,
    Error,
}

/// Per-type connection details; validated at creation and on `update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub file_path: Option<String>,
    pub connection_string: Option<String>,
    pub credentials: Option<String>,
    pub url: Option<String>,
    pub auth_token: Option<String>,
}

impl ConnectionConfig {
    fn validate(&self, source_type: SourceType) -> Result<(), String> {
        match source_type {
            SourceType::File => match &self.file_path {
                Some(path) if !path.trim().is_empty() => Ok(()),
                _ => Err("file source requires a non-empty file_path".to_string()),
            },
            SourceType::Database => match &self.connection_string {
                Some(cs) if !cs.trim().is_empty() => {
                    if self.credentials.is_none() {
                        Err("database source requires credentials".to_string())
                    } else {
                        Ok(())
                    }
                }
                _ => Err("database source requires a non-empty connection_string".to_string()),
            },
            SourceType::Api => match &self.url {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                    if self.auth_token.is_none() {
                        Err("api source requires an auth_token".to_string())
                    } else {
                        Ok(())
                    }
                }
                _ => Err("api source requires a valid http(s) url".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: Uuid,
    pub name: String,
    pub source_type: SourceType,
    pub connection: ConnectionConfig,
    pub status: SourceStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory registry of data sources (§4.D). The core only exercises the
/// hot-path lookups; CRUD and sync exist for completeness of the
/// component but are not on the query path.
pub struct DataSourceRegistry {
    sources: DashMap<Uuid, DataSource>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self { sources: DashMap::new() }
    }

    /// Creates with status `new`, immediately validates, and transitions to
    /// `active` on success or `error` on failure (§4.D state transitions).
    pub fn create(
        &self,
        name: impl Into<String>,
        source_type: SourceType,
        connection: ConnectionConfig,
    ) -> DataSource {
        let now = Utc::now();
        let mut source = DataSource {
            id: Uuid::new_v4(),
            name: name.into(),
            source_type,
            connection,
            status: SourceStatus::New,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        match source.connection.validate(source.source_type) {
            Ok(()) => source.status = SourceStatus::Active,
            Err(msg) => {
                source.status = SourceStatus::Error;
                source.error_message = Some(msg);
            }
        }

        self.sources.insert(source.id, source.clone());
        source
    }

    pub fn update(&self, id: Uuid, connection: ConnectionConfig) -> CoreResult<DataSource> {
        let mut entry = self
            .sources
            .get_mut(&id)
            .ok_or_else(|| CoreError::Validation(format!("unknown data source '{id}'")))?;

        entry.connection = connection;
        match entry.connection.validate(entry.source_type) {
            Ok(()) => {
                entry.status = SourceStatus::Active;
                entry.error_message = None;
            }
            Err(msg) => {
                entry.status = SourceStatus::Error;
                entry.error_message = Some(msg);
            }
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    pub fn delete(&self, id: Uuid) -> bool {
        self.sources.remove(&id).is_some()
    }

    /// `getById` (§4.D, hot path).
    pub fn get_by_id(&self, id: Uuid) -> Option<DataSource> {
        self.sources.get(&id).map(|r| r.clone())
    }

    /// `getActive` (§4.D, hot path): sources whose status is `active`.
    pub fn get_active(&self) -> Vec<DataSource> {
        self.sources
            .iter()
            .filter(|r| r.status == SourceStatus::Active)
            .map(|r| r.clone())
            .collect()
    }

    pub fn list(&self, offset: usize, limit: usize) -> Vec<DataSource> {
        let mut all: Vec<DataSource> = self.sources.iter().map(|r| r.clone()).collect();
        all.sort_by_key(|s| s.created_at);
        all.into_iter().skip(offset).take(limit).collect()
    }

    /// `active→syncing` during sync, `syncing→active` on success, any
    /// state `→error` on failure with a message (§4.D).
    pub fn begin_sync(&self, id: Uuid) -> CoreResult<()> {
        let mut entry = self
            .sources
            .get_mut(&id)
            .ok_or_else(|| CoreError::Validation(format!("unknown data source '{id}'")))?;
        entry.status = SourceStatus::Syncing;
        entry.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete_sync(&self, id: Uuid, result: Result<(), String>) -> CoreResult<()> {
        let mut entry = self
            .sources
            .get_mut(&id)
            .ok_or_else(|| CoreError::Validation(format!("unknown data source '{id}'")))?;
        match result {
            Ok(()) => {
                entry.status = SourceStatus::Active;
                entry.error_message = None;
            }
            Err(msg) => {
                entry.status = SourceStatus::Error;
                entry.error_message = Some(msg);
            }
        }
        entry.updated_at = Utc::now();
        Ok(())
    }

    /// `checkHealth(id)` (§4.D, hot path): a source is healthy iff it is
    /// currently `active`.
    pub fn check_health(&self, id: Uuid) -> CoreResult<bool> {
        let entry = self
            .sources
            .get(&id)
            .ok_or_else(|| CoreError::Validation(format!("unknown data source '{id}'")))?;
        Ok(entry.status == SourceStatus::Active)
    }
}

impl Default for DataSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
