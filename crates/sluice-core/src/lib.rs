pub mod classify;
pub use classify::{RemoteState, classify};

pub mod control_plane;
pub use control_plane::ControlPlane;

pub mod engine;
pub use engine::{BatchExecution, EngineConfig, ExecuteOptions, Execution, JobEngine, JobReport, PollReport};

pub mod error;
pub use error::{ControlPlaneError, CoreError};

pub mod events;
pub use events::{EngineEvent, EventBus, EventKind, Subscribe};

pub mod fanout;
pub use fanout::{BatchId, FanOut};

pub mod fetch;
pub use fetch::{RECENT_IMPORTS_WINDOW, StatusFetcher};

pub mod scheduler;
pub use scheduler::{RetryScheduler, Step};

pub mod state;
pub use state::{JobPhase, JobRecord, JobState, StateSubscriber};

pub mod submit;
pub use submit::{Submission, Submitter};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
