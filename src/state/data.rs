//! Data structures handed to the display
//!
//! A load produces an `ImagePayload`: a list of layers, each one a dense
//! pixel array plus the metadata the host needs to show it.

use image::{DynamicImage, RgbaImage};
use serde::Serialize;

/// Raw samples of an image, row-major, channels interleaved
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl PixelData {
    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            PixelData::U8(v) => v.len(),
            PixelData::U16(v) => v.len(),
            PixelData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dense n-dimensional pixel array.
/// Shape is `[height, width]` for single-channel images and
/// `[height, width, channels]` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageArray {
    shape: Vec<usize>,
    data: PixelData,
}

impl ImageArray {
    /// Zero-filled 8-bit array (used for the download placeholder)
    pub fn zeros_u8(height: usize, width: usize) -> Self {
        Self {
            shape: vec![height, width],
            data: PixelData::U8(vec![0; height * width]),
        }
    }

    /// Convert a decoded image without losing bit depth
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let height = image.height() as usize;
        let width = image.width() as usize;
        let shape = |channels: usize| {
            if channels == 1 {
                vec![height, width]
            } else {
                vec![height, width, channels]
            }
        };

        let (shape, data) = match image {
            DynamicImage::ImageLuma8(buf) => (shape(1), PixelData::U8(buf.into_raw())),
            DynamicImage::ImageLumaA8(buf) => (shape(2), PixelData::U8(buf.into_raw())),
            DynamicImage::ImageRgb8(buf) => (shape(3), PixelData::U8(buf.into_raw())),
            DynamicImage::ImageRgba8(buf) => (shape(4), PixelData::U8(buf.into_raw())),
            DynamicImage::ImageLuma16(buf) => (shape(1), PixelData::U16(buf.into_raw())),
            DynamicImage::ImageLumaA16(buf) => (shape(2), PixelData::U16(buf.into_raw())),
            DynamicImage::ImageRgb16(buf) => (shape(3), PixelData::U16(buf.into_raw())),
            DynamicImage::ImageRgba16(buf) => (shape(4), PixelData::U16(buf.into_raw())),
            DynamicImage::ImageRgb32F(buf) => (shape(3), PixelData::F32(buf.into_raw())),
            DynamicImage::ImageRgba32F(buf) => (shape(4), PixelData::F32(buf.into_raw())),
            other => (shape(4), PixelData::U8(other.to_rgba8().into_raw())),
        };

        Self { shape, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    pub fn height(&self) -> usize {
        self.shape[0]
    }

    pub fn width(&self) -> usize {
        self.shape[1]
    }

    pub fn channels(&self) -> usize {
        self.shape.get(2).copied().unwrap_or(1)
    }

    /// Render to 8-bit RGBA for on-screen display.
    ///
    /// 8-bit samples are used as-is; 16-bit and float samples are stretched
    /// linearly between their minimum and maximum. Returns `None` for
    /// channel counts the display cannot map.
    pub fn to_rgba8(&self) -> Option<RgbaImage> {
        let channels = self.channels();
        if !(1..=4).contains(&channels) {
            return None;
        }

        let samples = match &self.data {
            PixelData::U8(v) => v.clone(),
            PixelData::U16(v) => stretch_to_u8(v),
            PixelData::F32(v) => stretch_to_u8(v),
        };

        let mut rgba = Vec::with_capacity(self.height() * self.width() * 4);
        for pixel in samples.chunks_exact(channels) {
            match *pixel {
                [g] => rgba.extend_from_slice(&[g, g, g, u8::MAX]),
                [g, a] => rgba.extend_from_slice(&[g, g, g, a]),
                [r, g, b] => rgba.extend_from_slice(&[r, g, b, u8::MAX]),
                [r, g, b, a] => rgba.extend_from_slice(&[r, g, b, a]),
                _ => return None,
            }
        }

        RgbaImage::from_raw(self.width() as u32, self.height() as u32, rgba)
    }
}

/// Linear min/max stretch into 0..=255
fn stretch_to_u8<T: Copy + Into<f64>>(values: &[T]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            let v = v.into();
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            if range > 0.0 && range.is_finite() {
                ((v.into() - min) / range * 255.0).round() as u8
            } else {
                0
            }
        })
        .collect()
}

/// Display metadata for one layer.
/// Serializes to the mapping the host understands (`name`, optional `scale`).
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LayerMeta {
    /// Display label, also the key used to remove the layer
    pub name: String,
    /// Per-axis scale factors (only set on loaded images)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 2]>,
}

impl LayerMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scale: None,
        }
    }

    pub fn with_scale(mut self, scale: [f64; 2]) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A pixel array together with its display metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub data: ImageArray,
    pub meta: LayerMeta,
}

impl Layer {
    pub fn new(data: ImageArray, meta: LayerMeta) -> Self {
        Self { data, meta }
    }

    /// 1x1 black layer shown while the real image is on its way
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(ImageArray::zeros_u8(1, 1), LayerMeta::named(name))
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

/// What a sample-data call returns to the host
pub type ImagePayload = Vec<Layer>;

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

    #[test]
    fn test_grey_image_is_two_dimensional() {
        let img = GrayImage::from_fn(3, 2, |x, y| Luma([(x + 10 * y) as u8]));
        let array = ImageArray::from_dynamic(DynamicImage::ImageLuma8(img));

        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(array.channels(), 1);
        assert_eq!(array.data(), &PixelData::U8(vec![0, 1, 2, 10, 11, 12]));
    }

    #[test]
    fn test_sixteen_bit_keeps_depth() {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(2, 2, |x, y| Luma([1000 * (x + 2 * y) as u16]));
        let array = ImageArray::from_dynamic(DynamicImage::ImageLuma16(img));

        assert_eq!(array.shape(), &[2, 2]);
        assert_eq!(array.data(), &PixelData::U16(vec![0, 1000, 2000, 3000]));
    }

    #[test]
    fn test_rgb_shape() {
        let img = RgbImage::from_pixel(4, 1, Rgb([1, 2, 3]));
        let array = ImageArray::from_dynamic(DynamicImage::ImageRgb8(img));

        assert_eq!(array.shape(), &[1, 4, 3]);
        assert_eq!(array.data().len(), 12);
    }

    #[test]
    fn test_to_rgba8_stretches_sixteen_bit() {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(2, 1, vec![100, 300]).unwrap();
        let rgba = ImageArray::from_dynamic(DynamicImage::ImageLuma16(img))
            .to_rgba8()
            .unwrap();

        assert_eq!(rgba.dimensions(), (2, 1));
        assert_eq!(rgba.into_raw(), vec![0, 0, 0, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_placeholder() {
        let layer = Layer::placeholder("Downloading image...");
        assert_eq!(layer.data.shape(), &[1, 1]);
        assert_eq!(layer.data.data(), &PixelData::U8(vec![0]));
        assert_eq!(layer.meta.scale, None);
        assert_eq!(layer.meta.to_json().unwrap(), r#"{"name":"Downloading image..."}"#);
    }

    #[test]
    fn test_meta_json_with_scale() {
        let meta = LayerMeta::named("example").with_scale([1.0, 1.0]);
        assert_eq!(meta.to_json().unwrap(), r#"{"name":"example","scale":[1.0,1.0]}"#);
    }
}
