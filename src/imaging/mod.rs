//! Image decoding
//!
//! Turns the cached sample file into layers the host can display.
//! Decoding itself is delegated to the `image` crate.

pub mod loader;

pub use loader::ImageLoader;
