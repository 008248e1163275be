//! Sample download
//!
//! - `http.rs` - HTTP client seam and the reqwest implementation
//! - `chunked.rs` - streamed, durable, chunk-by-chunk write to a temp file
//! - `coordinator.rs` - background task, progress events, finalize + load

pub mod chunked;
pub mod coordinator;
pub mod http;

pub use chunked::{ChunkWritten, ChunkedDownload, DownloadJob};
pub use coordinator::{
    CompletedDownload, DownloadCoordinator, DownloadEvent, DownloadTask, PendingDownload,
    Progress, ProgressSink, TaskHandle, PLACEHOLDER_NAME, PROGRESS_DESCRIPTION,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
