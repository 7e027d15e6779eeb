//! Publish, open and share coordinator for lockbox.
//!
//! Provides per-file envelope encryption on top of untrusted storage:
//! - [`Coordinator`]: publish, open, delete, share and re-encrypt pipelines
//! - [`ObjectStorage`] for ciphertext and handed-off copies (in-memory, S3)
//! - [`DocumentDatabase`] for file, share and user records (in-memory, HTTP)
//! - [`FileState`] lifecycle tracking and [`ProgressEvent`] reporting
//!
//! Every file gets its own key pair. The private half lives in the caller's
//! secret store under a slot id; the content key is wrapped to the public
//! half and stored beside the record.

pub mod api_client;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod progress;
pub mod s3_transport;
pub mod sharing;
pub mod storage;
pub mod types;

pub use api_client::HttpDocumentDatabase;
pub use config::LockboxConfig;
pub use coordinator::Coordinator;
pub use database::{Document, DocumentDatabase, Filter, FilterOp, MemoryDocumentDatabase, Query};
pub use error::{CloudError, CloudResult, RemoteError, RemoteResult, Stage};
pub use lifecycle::{FileState, LifecycleTracker};
pub use progress::{
    ChannelProgress, FnProgress, NoopProgress, ProgressEvent, ProgressSink, ProgressStage,
};
pub use s3_transport::S3ObjectStorage;
pub use storage::{MemoryObjectStorage, ObjectMetadata, ObjectRef, ObjectStorage};
pub use types::*;
