//! Sample image loader
//!
//! Reads the cached file into a dense pixel array and packages it with its
//! display metadata. Nothing is kept in memory between calls.

use std::path::{Path, PathBuf};
use tokio::task;
use tracing::info;

use crate::error::{DecodeError, Result};
use crate::state::data::{ImageArray, ImagePayload, Layer, LayerMeta};

/// Display label of the loaded sample
pub const SAMPLE_LAYER_NAME: &str = "example (piroplasma example image)";

/// 1:1 display scale on both axes
pub const SAMPLE_SCALE: [f64; 2] = [1.0, 1.0];

#[derive(Debug, Clone)]
pub struct ImageLoader {
    path: PathBuf,
}

impl ImageLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the file into a single-layer payload.
    ///
    /// A missing, truncated or undecodable file is a [`DecodeError`]; this
    /// is how a broken earlier download shows up.
    pub fn load(&self) -> Result<ImagePayload, DecodeError> {
        let image = image::open(&self.path).map_err(|source| DecodeError {
            path: self.path.clone(),
            source,
        })?;

        let data = ImageArray::from_dynamic(image);
        info!(path = %self.path.display(), shape = ?data.shape(), "loaded sample image");

        let meta = LayerMeta::named(SAMPLE_LAYER_NAME).with_scale(SAMPLE_SCALE);
        Ok(vec![Layer::new(data, meta)])
    }

    /// Same as [`load`](Self::load), off the async executor.
    pub async fn load_async(self) -> Result<ImagePayload> {
        let payload = task::spawn_blocking(move || self.load()).await??;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SampleError;
    use crate::state::data::PixelData;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};
    use tempfile::TempDir;

    fn write_sample(dir: &TempDir) -> (PathBuf, GrayImage) {
        let img = GrayImage::from_fn(16, 8, |x, y| Luma([(x * 8 + y) as u8]));
        let path = dir.path().join("example_image_001.tif");
        DynamicImage::ImageLuma8(img.clone())
            .save_with_format(&path, ImageFormat::Tiff)
            .unwrap();
        (path, img)
    }

    #[test]
    fn test_load_returns_single_layer() {
        let dir = TempDir::new().unwrap();
        let (path, img) = write_sample(&dir);

        let payload = ImageLoader::new(&path).load().unwrap();

        assert_eq!(payload.len(), 1);
        let layer = &payload[0];
        assert_eq!(layer.meta.name, SAMPLE_LAYER_NAME);
        assert_eq!(layer.meta.scale, Some([1.0, 1.0]));
        assert_eq!(layer.data.shape(), &[8, 16]);
        assert_eq!(layer.data.data(), &PixelData::U8(img.into_raw()));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("example_image_001.tif");

        let err = ImageLoader::new(&path).load().unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_truncated_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_sample(&dir);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(ImageLoader::new(&path).load().is_err());
    }

    #[test]
    fn test_each_load_is_fresh() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_sample(&dir);
        let loader = ImageLoader::new(&path);

        let first = loader.load().unwrap();
        GrayImage::from_pixel(2, 2, Luma([9]))
            .save_with_format(&path, ImageFormat::Tiff)
            .unwrap();
        let second = loader.load().unwrap();

        assert_ne!(first, second);
        assert_eq!(second[0].data.shape(), &[2, 2]);
    }

    #[tokio::test]
    async fn test_load_async() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_sample(&dir);
        assert_eq!(ImageLoader::new(&path).load_async().await.unwrap().len(), 1);

        let missing = ImageLoader::new(dir.path().join("missing.tif"));
        assert!(matches!(missing.load_async().await, Err(SampleError::Decode(_))));
    }
}
