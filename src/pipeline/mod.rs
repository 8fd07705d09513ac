pub mod extraction;
pub mod identity;
pub mod registry;
pub mod tree;
pub mod structuring;
pub mod storage;
pub mod processor; // Per-file state machine and the directory walk

pub use processor::{
    DriverSettings, ErrorKind, FileError, PipelineDriver, PipelineError, RunSummary,
};
