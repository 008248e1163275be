//! Sample data entry point
//!
//! What the host calls when the user asks for the example image.

use std::sync::Arc;

use crate::cache::CacheLocator;
use crate::config::SampleSettings;
use crate::download::{DownloadCoordinator, HttpClient, PendingDownload, ReqwestClient};
use crate::error::Result;
use crate::imaging::ImageLoader;
use crate::state::data::ImagePayload;

/// Result of asking for the sample
pub enum SampleData<C> {
    /// The image was cached and is ready to show
    Loaded(ImagePayload),
    /// Show the placeholder now and run the task in the background
    Downloading(PendingDownload<C>),
}

/// Download the sample if it is not cached yet, otherwise load it.
///
/// A cached file is loaded synchronously and never triggers a request, even
/// if it turns out to be corrupt. Asking again while a download is running
/// fails with [`SampleError::InProgress`](crate::SampleError::InProgress).
pub fn make_sample_data<C: HttpClient>(coordinator: &DownloadCoordinator<C>) -> Result<SampleData<C>> {
    match coordinator.start()? {
        Some(pending) => Ok(SampleData::Downloading(pending)),
        None => {
            let image_path = coordinator.locator().image_path()?;
            Ok(SampleData::Loaded(ImageLoader::new(image_path).load()?))
        }
    }
}

/// Coordinator wired to the platform cache and a reqwest client
pub fn platform_coordinator(settings: SampleSettings) -> Result<DownloadCoordinator<ReqwestClient>> {
    let client = ReqwestClient::new()?;
    let locator = CacheLocator::platform()?;
    Ok(DownloadCoordinator::new(Arc::new(client), locator, settings))
}
