//! Viewer state
//!
//! This module holds what the host displays:
//! - Pixel arrays and layer metadata (data.rs)
//! - The live layer list and the display-handle trait (layers.rs)

pub mod data;
pub mod layers;
