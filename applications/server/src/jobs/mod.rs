/// Background mastering jobs
pub mod queue;
pub mod workflow;

pub use queue::{MasteringQueue, MasteringRequest};
pub use workflow::{JobInput, MasteringWorkflow, QueuedJob};
