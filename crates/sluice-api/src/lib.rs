mod error;
pub use error::ApiError;

mod dto;
pub use dto::{
    BatchItem, BatchRequest, BatchResponse, PollJobRequest, PollJobResponse, SubmitJobRequest,
    SubmitJobResponse,
};

mod handler;
pub use handler::ApiHandler;

mod adapter;
pub use adapter::EngineAdapter;
