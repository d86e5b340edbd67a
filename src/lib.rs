//! Composite a sparkle overlay onto a base image at a chosen opacity.
//!
//! The overlay's own alpha is scaled by the opacity, the overlay is stretched to
//! the base's size if needed, and the result is a standard source-over blend.
//! Inputs are never modified and every call produces a fresh image.
//!
//! # Quick Start
//!
//! ```no_run
//! use sparkle_compositor::composite;
//!
//! let base = image::open("treasure.png").unwrap();
//! let overlay = image::open("sparkles.png").unwrap();
//! let out = composite(&base, &overlay, 0.5).expect("composite failed");
//! out.save("composite_image.png").unwrap();
//! ```
//!
//! # Serving
//!
//! Load both images once into a [`SparkleAssets`] context and render from it
//! per request. The context is read-only, so it can be shared across threads.
//!
//! ```no_run
//! use std::path::Path;
//! use sparkle_compositor::{CompositeOptions, SparkleAssets};
//!
//! let assets = SparkleAssets::open(
//!     Path::new("assets/treasure.png"),
//!     Path::new("assets/sparkles.png"),
//!     CompositeOptions::default(),
//! )
//! .expect("failed to load assets");
//! let png_bytes = assets.render_png(None).expect("render failed");
//! # let _ = png_bytes;
//! ```

#![deny(missing_docs)]

pub mod blending;
mod engine;
pub mod error;

pub use blending::AlphaMode;
pub use engine::{
    composite, composite_bytes, composite_with, decode_image, default_output_path, encode_png,
    fit_overlay, is_supported_image, load_image, save_image, CompositeOptions, ProcessResult,
    ResizePolicy, SparkleAssets, SparkleEngine, DEFAULT_OPACITY,
};
pub use error::{Error, Result};
pub use image::imageops::FilterType;
