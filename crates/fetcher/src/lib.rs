pub mod artifacts;
pub mod commands;
pub mod config;
pub mod error;
pub mod job;
pub mod manager;
pub mod metadata;
pub mod progress;
pub mod quality;
pub mod retry;
pub mod runner;
pub mod sink;
pub mod status;

pub use artifacts::{ArtifactPaths, ArtifactStore};
pub use config::FetcherConfig;
pub use error::{StageError, SubmitError};
pub use job::{JobOutcome, JobState, RequesterId};
pub use manager::{CancelAck, JobHandle, JobManager};
pub use quality::Quality;
pub use sink::{Delivery, StatusSink, UploadProgressFn};
