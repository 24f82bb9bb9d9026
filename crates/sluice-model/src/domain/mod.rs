mod task_id;
pub use task_id::TaskId;

mod verdict;
pub use verdict::Verdict;

mod job;
pub use job::Job;

mod job_status;
pub use job_status::JobStatus;

mod outcome;
pub use outcome::JobOutcome;

mod handle;
pub use handle::{DeferredTaskHandle, ResumeContext};

mod aggregate;
pub use aggregate::{AggregateResult, BatchSummary, ResolvedJob};

/// Logical name of a control-plane namespace.
pub type Namespace = String;

/// Logical name of a repository inside a namespace.
pub type Repository = String;
