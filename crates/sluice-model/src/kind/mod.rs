mod job;
pub use job::{
    ExportDestination, ExportFormat, ExportSource, ImportDestination, ImportSource, JobGroup,
    JobKind, JobSpec, SpecError,
};
