//! Piroplasma sample dataset provider.
//!
//! Downloads the example image into the user's cache on first use, showing
//! a placeholder layer while the transfer runs, then swaps in the decoded
//! image. Later calls load straight from the cache.
//!
//! - [`cache`] - where the image lives on disk
//! - [`config`] - download settings
//! - [`download`] - HTTP seam, durable chunked writer, background coordinator
//! - [`imaging`] - decoding the cached file into layers
//! - [`state`] - pixel arrays, layer metadata and the display handle
//! - [`sample`] - the entry point the host calls

pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod imaging;
pub mod sample;
pub mod state;

pub use error::{Result, SampleError};
pub use sample::{make_sample_data, platform_coordinator, SampleData};
