use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Namespace, Repository, ResumeContext};

/// Direction of a job relative to the data platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    /// Ingest an external source into a repository.
    Import,
    /// Export a table or query result to the downstream store.
    Export,
}

impl JobKind {
    /// Returns a short symbolic identifier, intended for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Import => "import",
            JobKind::Export => "export",
        }
    }
}

/// Batch partition a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobGroup {
    Import,
    TableExport,
    QueryExport,
    DatabaseExport,
}

impl JobGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobGroup::Import => "import",
            JobGroup::TableExport => "table-export",
            JobGroup::QueryExport => "query-export",
            JobGroup::DatabaseExport => "database-export",
        }
    }
}

/// Parameters of a job to submit.
///
/// Plugin-specific parameter schemas are opaque here; they are validated by the control plane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JobSpec {
    Import {
        source: ImportSource,
        destination: ImportDestination,
    },
    Export {
        source: ExportSource,
        destination: ExportDestination,
    },
}

/// External source ingested by an import job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSource {
    /// Name of the ingestion plugin (e.g. `"csv"`, `"postgres"`).
    pub plugin: String,
    /// Plugin parameters, passed through untouched.
    #[serde(default)]
    pub params: serde_json::Value,
    /// Reference to credentials already stored on the control plane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
}

/// Repository an import lands in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDestination {
    pub namespace: Namespace,
    pub repository: Repository,
    /// Tables to import. Empty means every table the plugin discovers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<String>,
}

/// What an export job reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExportSource {
    /// A single table of a repository.
    Table {
        namespace: Namespace,
        repository: Repository,
        table: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
    /// The result of an SQL query.
    Query {
        query: String,
        /// Restrict the query to one virtual database.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vdb_id: Option<String>,
    },
    /// A whole repository image.
    Database {
        namespace: Namespace,
        repository: Repository,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Parquet,
}

/// Where an export job writes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDestination {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

impl JobSpec {
    pub fn kind(&self) -> JobKind {
        match self {
            JobSpec::Import { .. } => JobKind::Import,
            JobSpec::Export { .. } => JobKind::Export,
        }
    }

    pub fn group(&self) -> JobGroup {
        match self {
            JobSpec::Import { .. } => JobGroup::Import,
            JobSpec::Export { source, .. } => match source {
                ExportSource::Table { .. } => JobGroup::TableExport,
                ExportSource::Query { .. } => JobGroup::QueryExport,
                ExportSource::Database { .. } => JobGroup::DatabaseExport,
            },
        }
    }

    /// Keys needed to find this job's status again after submission.
    pub fn resume_context(&self) -> ResumeContext {
        match self {
            JobSpec::Import { destination, .. } => ResumeContext::Import {
                namespace: destination.namespace.clone(),
                repository: destination.repository.clone(),
            },
            JobSpec::Export { .. } => ResumeContext::Export,
        }
    }

    /// Credential reference forwarded with the submission.
    pub fn credential_ref(&self) -> Option<&str> {
        match self {
            JobSpec::Import { source, .. } => source.credential_ref.as_deref(),
            JobSpec::Export { .. } => None,
        }
    }

    /// Reject specs the control plane would refuse anyway.
    pub fn validate(&self) -> Result<(), SpecError> {
        match self {
            JobSpec::Import {
                source,
                destination,
            } => {
                non_empty(&source.plugin, "plugin")?;
                non_empty(&destination.namespace, "namespace")?;
                non_empty(&destination.repository, "repository")
            }
            JobSpec::Export { source, .. } => match source {
                ExportSource::Table {
                    namespace,
                    repository,
                    table,
                    ..
                } => {
                    non_empty(namespace, "namespace")?;
                    non_empty(repository, "repository")?;
                    non_empty(table, "table")
                }
                ExportSource::Query { query, .. } => non_empty(query, "query"),
                ExportSource::Database {
                    namespace,
                    repository,
                    ..
                } => {
                    non_empty(namespace, "namespace")?;
                    non_empty(repository, "repository")
                }
            },
        }
    }
}

fn non_empty(value: &str, field: &'static str) -> Result<(), SpecError> {
    if value.trim().is_empty() {
        return Err(SpecError::Empty(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_import() -> JobSpec {
        JobSpec::Import {
            source: ImportSource {
                plugin: "csv".to_string(),
                params: serde_json::json!({"url": "https://example.com/a.csv"}),
                credential_ref: Some("cred-1".to_string()),
            },
            destination: ImportDestination {
                namespace: "acme".to_string(),
                repository: "sales".to_string(),
                tables: vec![],
            },
        }
    }

    #[test]
    fn groups_partition_exports_by_source() {
        let table = JobSpec::Export {
            source: ExportSource::Table {
                namespace: "a".into(),
                repository: "b".into(),
                table: "c".into(),
                tag: None,
            },
            destination: ExportDestination::default(),
        };
        let db = JobSpec::Export {
            source: ExportSource::Database {
                namespace: "a".into(),
                repository: "b".into(),
                tag: Some("latest".into()),
            },
            destination: ExportDestination::default(),
        };

        assert_eq!(table.group(), JobGroup::TableExport);
        assert_eq!(db.group(), JobGroup::DatabaseExport);
        assert_eq!(csv_import().group(), JobGroup::Import);
        assert_eq!(JobGroup::QueryExport.as_str(), "query-export");
    }

    #[test]
    fn import_resume_context_uses_destination() {
        assert_eq!(
            csv_import().resume_context(),
            ResumeContext::import("acme", "sales")
        );
        assert_eq!(csv_import().credential_ref(), Some("cred-1"));
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let spec = JobSpec::Export {
            source: ExportSource::Query {
                query: "   ".to_string(),
                vdb_id: None,
            },
            destination: ExportDestination::default(),
        };
        assert_eq!(spec.validate(), Err(SpecError::Empty("query")));
        assert!(csv_import().validate().is_ok());
    }

    #[test]
    fn spec_json_shape() {
        let json = serde_json::to_value(csv_import()).unwrap();
        assert_eq!(json["kind"], "import");
        assert_eq!(json["source"]["plugin"], "csv");
        assert_eq!(json["source"]["credentialRef"], "cred-1");
        assert!(json["destination"].get("tables").is_none());
    }
}
