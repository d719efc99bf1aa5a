/// Server services
pub mod artifact_delivery;
pub mod dsp_executor;
pub mod file_storage;
pub mod job_tracker;
pub mod remote_storage;
pub mod source_fetcher;

pub use artifact_delivery::ArtifactDelivery;
pub use dsp_executor::{DspExecutor, FfmpegExecutor, ProcessRequest};
pub use file_storage::{FileStorage, JobFiles};
pub use job_tracker::{JobEvent, JobTracker};
pub use remote_storage::{HttpObjectStorage, RemoteStorage};
pub use source_fetcher::SourceFetcher;
