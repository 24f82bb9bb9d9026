use serde::{Deserialize, Serialize};

use crate::{JobKind, Namespace, Repository, TaskId};

/// Extra keys a job kind needs to look its status up again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResumeContext {
    /// Imports are only listed per destination repository.
    Import {
        namespace: Namespace,
        repository: Repository,
    },
    /// Exports are looked up directly by task id.
    Export,
}

impl ResumeContext {
    pub fn import(namespace: impl Into<String>, repository: impl Into<String>) -> Self {
        Self::Import {
            namespace: namespace.into(),
            repository: repository.into(),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            ResumeContext::Import { .. } => JobKind::Import,
            ResumeContext::Export => JobKind::Export,
        }
    }
}

/// Resumable reference to a submitted job.
///
/// Returned by deferred submissions. Holds no live state, so it can be stored,
/// sent to another process and polled from there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredTaskHandle {
    pub task_id: TaskId,
    pub resume_context: ResumeContext,
}

impl DeferredTaskHandle {
    pub fn new(task_id: impl Into<TaskId>, resume_context: ResumeContext) -> Self {
        Self {
            task_id: task_id.into(),
            resume_context,
        }
    }

    pub fn export(task_id: impl Into<TaskId>) -> Self {
        Self::new(task_id, ResumeContext::Export)
    }

    pub fn kind(&self) -> JobKind {
        self.resume_context.kind()
    }
}
