//! Common utilities and types shared across thoth-s2i crates.

pub mod error;
pub mod image;

pub use error::{Error, Result};
pub use image::{ImageReference, DEFAULT_TAG};
