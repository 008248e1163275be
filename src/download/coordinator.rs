//! Background download orchestration
//!
//! `Idle -> Downloading -> Idle`. The cache guard is whether the final file
//! exists; its contents are never checked. While a download is in flight a
//! second `start` is refused, since both jobs would share one temp file.
//!
//! The coordinator never owns a thread or a display. The host runs the
//! returned [`DownloadTask`] wherever it runs background work, and calls
//! [`DownloadCoordinator::finish`] (or [`abandon`](DownloadCoordinator::abandon))
//! from the thread that owns its layers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::chunked::{ChunkWritten, ChunkedDownload, DownloadJob};
use super::http::{BoxStream, HttpClient};
use crate::cache::CacheLocator;
use crate::config::SampleSettings;
use crate::error::{FilesystemError, Result, SampleError};
use crate::imaging::ImageLoader;
use crate::state::data::{ImagePayload, Layer};
use crate::state::layers::LayerHost;

/// Name of the placeholder layer; also its removal key
pub const PLACEHOLDER_NAME: &str = "Downloading image...";

/// Label reported alongside every progress tick
pub const PROGRESS_DESCRIPTION: &str = "Downloading example image...";

/// Progress after one durable chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub description: String,
}

impl Progress {
    /// `current / total`. Can exceed 1.0 when the server sends more than
    /// the expected size.
    pub fn fraction(&self) -> f32 {
        self.current as f32 / self.total.max(1) as f32
    }
}

/// Receives progress ticks from a running download
pub trait ProgressSink {
    fn report(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressSink for F {
    fn report(&mut self, progress: &Progress) {
        self(progress)
    }
}

/// A fully synced temp file, not yet renamed into place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDownload {
    pub temp_path: PathBuf,
    pub final_path: PathBuf,
    pub chunks: u64,
    pub bytes: u64,
}

/// What a running download reports: any number of `Progress` events,
/// then exactly one `Completed` or `Failed`.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Progress(Progress),
    Completed(CompletedDownload),
    Failed(Arc<SampleError>),
}

/// A download that has not run yet
pub struct DownloadTask<C> {
    client: Arc<C>,
    job: DownloadJob,
    total_chunks: u64,
}

impl<C: HttpClient> DownloadTask<C> {
    pub fn job(&self) -> &DownloadJob {
        &self.job
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    fn progress(&self, tick: ChunkWritten) -> Progress {
        Progress {
            current: tick.index,
            total: self.total_chunks,
            description: PROGRESS_DESCRIPTION.to_string(),
        }
    }

    fn completed(&self, download: &ChunkedDownload) -> CompletedDownload {
        info!(
            url = %self.job.url,
            chunks = download.chunks_written(),
            bytes = download.bytes_written(),
            "download finished"
        );

        CompletedDownload {
            temp_path: download.temp_path().to_path_buf(),
            final_path: self.job.destination.clone(),
            chunks: download.chunks_written(),
            bytes: download.bytes_written(),
        }
    }

    /// Run to completion, reporting each chunk to `sink`
    pub async fn run(self, sink: &mut impl ProgressSink) -> Result<CompletedDownload> {
        let mut download = ChunkedDownload::start(self.client.as_ref(), &self.job).await?;

        while let Some(tick) = download.next_chunk().await? {
            sink.report(&self.progress(tick));
        }

        Ok(self.completed(&download))
    }

    /// Run as an event stream, for hosts that consume streams on their own
    /// executor.
    pub fn into_events(self) -> BoxStream<'static, DownloadEvent> {
        Box::pin(async_stream::stream! {
            match ChunkedDownload::start(self.client.as_ref(), &self.job).await {
                Err(err) => {
                    error!(url = %self.job.url, %err, "download failed to start");
                    yield DownloadEvent::Failed(Arc::new(err));
                }
                Ok(mut download) => loop {
                    match download.next_chunk().await {
                        Ok(Some(tick)) => {
                            yield DownloadEvent::Progress(self.progress(tick));
                        }
                        Ok(None) => {
                            yield DownloadEvent::Completed(self.completed(&download));
                            break;
                        }
                        Err(err) => {
                            error!(url = %self.job.url, %err, "download failed");
                            yield DownloadEvent::Failed(Arc::new(err));
                            break;
                        }
                    }
                },
            }
        })
    }

    /// Run on a tokio worker. Must be called from within a runtime.
    pub fn spawn(self) -> TaskHandle {
        let (tx, progress) = mpsc::unbounded_channel();

        let worker = tokio::spawn(async move {
            let mut forward = move |p: &Progress| {
                // receiver gone means nobody is watching; keep downloading
                let _ = tx.send(p.clone());
            };
            self.run(&mut forward).await
        });

        TaskHandle { progress, worker }
    }
}

/// A download running on a tokio worker
pub struct TaskHandle {
    progress: mpsc::UnboundedReceiver<Progress>,
    worker: JoinHandle<Result<CompletedDownload>>,
}

impl TaskHandle {
    /// Next progress tick, or `None` once the worker is done
    pub async fn next_progress(&mut self) -> Option<Progress> {
        self.progress.recv().await
    }

    /// Forward remaining progress to `sink` and return the outcome
    pub async fn wait(mut self, sink: &mut impl ProgressSink) -> Result<CompletedDownload> {
        while let Some(progress) = self.next_progress().await {
            sink.report(&progress);
        }
        self.worker.await?
    }
}

/// A started download: the placeholder to show now, and the work to run
pub struct PendingDownload<C> {
    pub placeholder: ImagePayload,
    pub task: DownloadTask<C>,
}

/// Owns the client, cache location and settings for the sample download.
///
/// Every download returned by [`start`](Self::start) must end in
/// [`finish`](Self::finish), [`install`](Self::install) or
/// [`abandon`](Self::abandon); until then further starts are refused.
pub struct DownloadCoordinator<C> {
    client: Arc<C>,
    locator: CacheLocator,
    settings: SampleSettings,
    in_flight: AtomicBool,
}

impl<C: HttpClient> DownloadCoordinator<C> {
    pub fn new(client: Arc<C>, locator: CacheLocator, settings: SampleSettings) -> Self {
        Self {
            client,
            locator,
            settings,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn locator(&self) -> &CacheLocator {
        &self.locator
    }

    pub fn settings(&self) -> &SampleSettings {
        &self.settings
    }

    /// Whether a started download has not been finished or abandoned yet
    pub fn is_downloading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Begin downloading unless the final file already exists.
    ///
    /// Returns `None` on a cache hit. No request is made here; the network
    /// is only touched once the returned task runs. Fails with
    /// [`SampleError::InProgress`] while an earlier download is unsettled.
    pub fn start(&self) -> Result<Option<PendingDownload<C>>> {
        let image_path = self.locator.image_path()?;
        if image_path.exists() {
            debug!(path = %image_path.display(), "sample already cached");
            return Ok(None);
        }

        if self.in_flight.swap(true, Ordering::SeqCst) {
            warn!(path = %image_path.display(), "sample download already running");
            return Err(SampleError::InProgress);
        }

        let job = DownloadJob::new(&self.settings.url, image_path, self.settings.chunk_size);
        let total_chunks = self.settings.total_chunks();
        info!(
            url = %job.url,
            destination = %job.destination.display(),
            total_chunks,
            "starting sample download"
        );

        Ok(Some(PendingDownload {
            placeholder: vec![Layer::placeholder(PLACEHOLDER_NAME)],
            task: DownloadTask {
                client: Arc::clone(&self.client),
                job,
                total_chunks,
            },
        }))
    }

    /// Move the temp file into place and drop the placeholder.
    ///
    /// Returns the loader for the cached file so the host can decode it
    /// wherever it does heavy work. The placeholder is removed even when the
    /// rename fails.
    pub fn install<H: LayerHost + ?Sized>(
        &self,
        host: &mut H,
        done: &CompletedDownload,
    ) -> Result<ImageLoader> {
        self.in_flight.store(false, Ordering::SeqCst);
        host.remove_layer(PLACEHOLDER_NAME);

        std::fs::rename(&done.temp_path, &done.final_path).map_err(|source| {
            let err = FilesystemError::Rename {
                from: done.temp_path.clone(),
                to: done.final_path.clone(),
                source,
            };
            error!(%err, "sample could not be moved into cache");
            err
        })?;
        debug!(path = %done.final_path.display(), "sample moved into cache");

        Ok(ImageLoader::new(&done.final_path))
    }

    /// Completion step: [`install`](Self::install), then decode on the
    /// calling thread and add the image.
    ///
    /// On a decode failure the placeholder is already gone and the file
    /// stays cached, same as a corrupt cache hit.
    pub fn finish<H: LayerHost + ?Sized>(
        &self,
        host: &mut H,
        done: &CompletedDownload,
    ) -> Result<()> {
        for layer in self.install(host, done)?.load()? {
            host.add_layer(layer);
        }
        Ok(())
    }

    /// Failure step: drop the placeholder so it does not hang around.
    /// The partial temp file is left for the next attempt to discard.
    pub fn abandon<H: LayerHost + ?Sized>(&self, host: &mut H, err: &SampleError) {
        error!(%err, "sample download abandoned");
        self.in_flight.store(false, Ordering::SeqCst);
        host.remove_layer(PLACEHOLDER_NAME);
    }
}
