use serde::{Deserialize, Serialize};

/// Classification of a remote status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    /// Job is queued, running, or not yet visible. Keep polling.
    Unresolved,
    /// Job finished successfully.
    Succeeded,
    /// Job reached a terminal failure state on the remote side.
    Failed,
}

impl Verdict {
    /// Returns `true` if the job won't transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Verdict::Succeeded | Verdict::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Unresolved => "unresolved",
            Verdict::Succeeded => "succeeded",
            Verdict::Failed => "failed",
        }
    }
}
