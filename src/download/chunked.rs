//! Streamed, chunked download into a temp file
//!
//! Each chunk is written, flushed and synced before the next one is pulled,
//! so a crash loses at most the chunk in flight and a finished temp file is
//! fully on disk. There is no resume: a leftover temp file is deleted first.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::http::{BoxStream, HttpClient};
use crate::cache;
use crate::error::{FilesystemError, Result, TransferError};

/// One download: where from, where to, how big each write is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub destination: PathBuf,
    pub chunk_size: usize,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Where bytes land until the download completes
    pub fn temp_path(&self) -> PathBuf {
        cache::temp_path(&self.destination)
    }
}

/// Progress tick for one durably written chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWritten {
    /// 1-based chunk number
    pub index: u64,
    /// Size of this chunk
    pub bytes: usize,
    /// Bytes on disk so far
    pub total_bytes: u64,
}

/// An open download. Pull it with [`ChunkedDownload::next_chunk`] until it
/// returns `None`; it cannot be restarted.
pub struct ChunkedDownload {
    url: String,
    body: BoxStream<'static, std::result::Result<Bytes, TransferError>>,
    file: File,
    temp_path: PathBuf,
    chunk_size: usize,
    pending: BytesMut,
    body_done: bool,
    chunks_written: u64,
    bytes_written: u64,
}

impl ChunkedDownload {
    /// Send the request and prepare a fresh temp file.
    ///
    /// Fails with a transfer error on a non-success status, before anything
    /// is written to disk.
    pub async fn start<C: HttpClient>(client: &C, job: &DownloadJob) -> Result<Self> {
        let response = client.get(&job.url).await?;
        if !response.is_success() {
            return Err(TransferError::Status {
                url: job.url.clone(),
                status: response.status,
            }
            .into());
        }

        let temp_path = job.temp_path();
        match fs::remove_file(&temp_path).await {
            Ok(()) => warn!(path = %temp_path.display(), "discarded stale partial download"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(FilesystemError::RemoveStale {
                    path: temp_path,
                    source,
                }
                .into())
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await
            .map_err(|source| FilesystemError::Create {
                path: temp_path.clone(),
                source,
            })?;

        debug!(url = %job.url, path = %temp_path.display(), "download stream opened");

        Ok(Self {
            url: job.url.clone(),
            body: response.body,
            file,
            temp_path,
            chunk_size: job.chunk_size.max(1),
            pending: BytesMut::new(),
            body_done: false,
            chunks_written: 0,
            bytes_written: 0,
        })
    }

    /// Write the next full chunk (or the final short one) to disk.
    /// Returns `None` once the body is exhausted and everything is synced.
    pub async fn next_chunk(&mut self) -> Result<Option<ChunkWritten>> {
        loop {
            if self.pending.len() >= self.chunk_size {
                let chunk = self.pending.split_to(self.chunk_size).freeze();
                return Ok(Some(self.write_durable(chunk).await?));
            }

            if self.body_done {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let chunk = self.pending.split().freeze();
                return Ok(Some(self.write_durable(chunk).await?));
            }

            match self.body.next().await {
                // empty keep-alive chunks are a no-op here
                Some(bytes) => self.pending.extend_from_slice(&bytes?),
                None => self.body_done = true,
            }
        }
    }

    async fn write_durable(&mut self, chunk: Bytes) -> Result<ChunkWritten, FilesystemError> {
        let write_error = |source| FilesystemError::Write {
            path: self.temp_path.clone(),
            source,
        };

        self.file.write_all(&chunk).await.map_err(write_error)?;
        self.file.flush().await.map_err(write_error)?;
        self.file.sync_all().await.map_err(write_error)?;

        self.chunks_written += 1;
        self.bytes_written += chunk.len() as u64;

        debug!(
            url = %self.url,
            chunk = self.chunks_written,
            bytes = self.bytes_written,
            "chunk synced"
        );

        Ok(ChunkWritten {
            index: self.chunks_written,
            bytes: chunk.len(),
            total_bytes: self.bytes_written,
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::http::mock::MockClient;
    use crate::error::SampleError;
    use tempfile::TempDir;

    const MIB: usize = 1024 * 1024;

    fn job_in(dir: &TempDir, chunk_size: usize) -> DownloadJob {
        DownloadJob::new("http://test/example.tif", dir.path().join("example.tif"), chunk_size)
    }

    async fn drain(download: &mut ChunkedDownload) -> Vec<ChunkWritten> {
        let mut ticks = Vec::new();
        while let Some(tick) = download.next_chunk().await.unwrap() {
            ticks.push(tick);
        }
        ticks
    }

    #[tokio::test]
    async fn test_writes_exact_bytes_for_uneven_chunks() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, 4);
        let body: Vec<Vec<u8>> = vec![vec![1; 3], vec![2; 7], vec![], vec![3; 1], vec![4; 9]];
        let expected: Vec<u8> = body.concat();
        let client = MockClient::ok(body);

        let mut download = ChunkedDownload::start(&client, &job).await.unwrap();
        let ticks = drain(&mut download).await;

        assert_eq!(ticks.iter().map(|t| t.bytes).collect::<Vec<_>>(), vec![4, 4, 4, 4, 4]);
        assert_eq!(ticks.last().unwrap().total_bytes, 20);
        assert_eq!(std::fs::read(job.temp_path()).unwrap(), expected);
        assert!(!job.destination.exists());
    }

    #[tokio::test]
    async fn test_short_final_chunk() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, MIB);
        let client = MockClient::ok(vec![vec![7; MIB], vec![8; MIB], vec![9; MIB / 2]]);

        let mut download = ChunkedDownload::start(&client, &job).await.unwrap();
        let ticks = drain(&mut download).await;

        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[2].bytes, MIB / 2);
        assert_eq!(download.bytes_written(), (MIB * 5 / 2) as u64);
        assert_eq!(std::fs::metadata(job.temp_path()).unwrap().len(), (MIB * 5 / 2) as u64);
    }

    #[tokio::test]
    async fn test_exhausted_download_stays_exhausted() {
        let dir = TempDir::new().unwrap();
        let client = MockClient::ok(vec![vec![1; 10]]);

        let mut download = ChunkedDownload::start(&client, &job_in(&dir, 4)).await.unwrap();
        assert_eq!(drain(&mut download).await.len(), 3);
        assert!(download.next_chunk().await.unwrap().is_none());
        assert_eq!(download.chunks_written(), 3);
    }

    #[tokio::test]
    async fn test_stale_temp_file_is_discarded() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, 8);
        std::fs::write(job.temp_path(), vec![0xAA; 100]).unwrap();
        let client = MockClient::ok(vec![b"fresh".to_vec()]);

        let mut download = ChunkedDownload::start(&client, &job).await.unwrap();
        drain(&mut download).await;

        assert_eq!(std::fs::read(job.temp_path()).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_error_status_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, 8);
        let client = MockClient::status(404);

        let err = ChunkedDownload::start(&client, &job).await.err().unwrap();
        assert!(matches!(
            err,
            SampleError::Transfer(TransferError::Status { status: 404, .. })
        ));
        assert!(!job.temp_path().exists());
        assert!(!job.destination.exists());
    }

    #[tokio::test]
    async fn test_interrupted_stream_keeps_synced_chunks() {
        let dir = TempDir::new().unwrap();
        let job = job_in(&dir, 4);
        let client = MockClient::interrupted(vec![vec![5; 6]]);

        let mut download = ChunkedDownload::start(&client, &job).await.unwrap();
        assert_eq!(download.next_chunk().await.unwrap().unwrap().bytes, 4);
        let err = download.next_chunk().await.unwrap_err();

        assert!(matches!(err, SampleError::Transfer(TransferError::Stream { .. })));
        assert_eq!(std::fs::read(job.temp_path()).unwrap(), vec![5; 4]);
    }
}
