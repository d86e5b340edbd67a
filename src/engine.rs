//! Compositing engine: options, overlay normalization, and file processing.

use std::borrow::Cow;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, Rgba32FImage, RgbaImage};

use crate::blending::{self, to_channel, AlphaMode};
use crate::error::{Error, Result};

/// Opacity used when the caller does not choose one.
pub const DEFAULT_OPACITY: f32 = 0.9;

/// What to do when the overlay's dimensions differ from the base's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePolicy {
    /// Stretch the overlay to the base's exact size with the given filter.
    Stretch(FilterType),
    /// Refuse to composite, returning [`Error::Dimension`].
    Reject,
}

impl Default for ResizePolicy {
    fn default() -> Self {
        ResizePolicy::Stretch(FilterType::CatmullRom)
    }
}

/// Options controlling how the overlay is blended onto the base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeOptions {
    /// Overlay opacity, nominally `0.0..=1.0`. Not validated here.
    pub opacity: f32,
    /// How opacity becomes the overlay's effective alpha.
    pub alpha_mode: AlphaMode,
    /// Handling of mismatched overlay dimensions.
    pub resize: ResizePolicy,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            opacity: DEFAULT_OPACITY,
            alpha_mode: AlphaMode::Scale,
            resize: ResizePolicy::default(),
        }
    }
}

/// Composite `overlay` onto `base` at `opacity` with default options otherwise.
///
/// Images without an alpha channel are treated as fully opaque. The overlay is
/// stretched to the base's dimensions when they differ.
///
/// # Errors
///
/// Fails only under a [`ResizePolicy::Reject`] policy, which this function
/// does not use, so in practice it always succeeds.
pub fn composite(base: &DynamicImage, overlay: &DynamicImage, opacity: f32) -> Result<RgbaImage> {
    let opts = CompositeOptions {
        opacity,
        ..CompositeOptions::default()
    };
    composite_with(base, overlay, &opts)
}

/// Composite `overlay` onto `base` using the full option set.
///
/// # Errors
///
/// Returns [`Error::Dimension`] if the dimensions differ and `opts.resize`
/// is [`ResizePolicy::Reject`].
pub fn composite_with(
    base: &DynamicImage,
    overlay: &DynamicImage,
    opts: &CompositeOptions,
) -> Result<RgbaImage> {
    let base = base.to_rgba8();
    let overlay = overlay.to_rgba8();
    let overlay = fit_overlay(&overlay, base.width(), base.height(), opts.resize)?;
    blending::blend_layers(&base, &overlay, opts.opacity, opts.alpha_mode)
}

/// Decode both images from encoded bytes and composite them.
///
/// # Errors
///
/// Returns [`Error::ImageFormat`] if either input cannot be decoded, or
/// [`Error::Dimension`] as for [`composite_with`].
pub fn composite_bytes(base: &[u8], overlay: &[u8], opts: &CompositeOptions) -> Result<RgbaImage> {
    let base = decode_image(base)?;
    let overlay = decode_image(overlay)?;
    composite_with(&base, &overlay, opts)
}

/// Decode an image from encoded bytes.
///
/// # Errors
///
/// Returns [`Error::ImageFormat`] if the bytes are not a decodable image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(Error::from_decode)
}

/// Load an image from disk.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read and
/// [`Error::ImageFormat`] if its content cannot be decoded.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(Error::from_decode)
}

/// Bring the overlay to exactly `width` x `height`.
///
/// Returns the overlay unchanged (borrowed) when it already has those
/// dimensions, so matching inputs are never resampled.
///
/// # Errors
///
/// Returns [`Error::Dimension`] on mismatch under [`ResizePolicy::Reject`].
pub fn fit_overlay(
    overlay: &RgbaImage,
    width: u32,
    height: u32,
    policy: ResizePolicy,
) -> Result<Cow<'_, RgbaImage>> {
    Ok(match resize_filter(overlay, width, height, policy)? {
        None => Cow::Borrowed(overlay),
        Some(filter) => Cow::Owned(stretch(overlay, width, height, filter)),
    })
}

fn resize_filter(
    overlay: &RgbaImage,
    width: u32,
    height: u32,
    policy: ResizePolicy,
) -> Result<Option<FilterType>> {
    if overlay.dimensions() == (width, height) {
        return Ok(None);
    }
    match policy {
        ResizePolicy::Stretch(filter) => Ok(Some(filter)),
        ResizePolicy::Reject => Err(Error::Dimension {
            base_width: width,
            base_height: height,
            overlay_width: overlay.width(),
            overlay_height: overlay.height(),
        }),
    }
}

fn stretch(overlay: &RgbaImage, width: u32, height: u32, filter: FilterType) -> RgbaImage {
    tracing::debug!(
        from = ?overlay.dimensions(),
        to = ?(width, height),
        ?filter,
        "stretching overlay"
    );
    // Nothing to sample from; an empty overlay contributes nothing.
    if overlay.width() == 0 || overlay.height() == 0 {
        return RgbaImage::new(width, height);
    }

    // Resample premultiplied so transparent texels don't bleed their color
    // into partially covered edges. Float samples live in [0, 1].
    let premul = Rgba32FImage::from_fn(overlay.width(), overlay.height(), |x, y| {
        let px = overlay.get_pixel(x, y);
        let a = f32::from(px[3]) / 255.0;
        Rgba([
            f32::from(px[0]) / 255.0 * a,
            f32::from(px[1]) / 255.0 * a,
            f32::from(px[2]) / 255.0 * a,
            a,
        ])
    });
    let resized = imageops::resize(&premul, width, height, filter);

    RgbaImage::from_fn(width, height, |x, y| {
        let px = resized.get_pixel(x, y);
        let a = px[3].clamp(0.0, 1.0);
        let alpha = to_channel(a * 255.0);
        if alpha == 0 {
            return Rgba([0, 0, 0, 0]);
        }
        Rgba([
            to_channel(px[0] / a * 255.0),
            to_channel(px[1] / a * 255.0),
            to_channel(px[2] / a * 255.0),
            alpha,
        ])
    })
}

/// Base and overlay decoded once and held read-only for repeated rendering.
///
/// The overlay is normalized to the base's dimensions at construction. Each
/// [`render`](Self::render) produces a fresh composite; nothing is cached.
/// The value is immutable and can be shared across threads by reference.
#[derive(Debug, Clone)]
pub struct SparkleAssets {
    base: RgbaImage,
    overlay: RgbaImage,
    options: CompositeOptions,
}

impl SparkleAssets {
    /// Build the context from already-decoded images.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dimension`] on mismatch under [`ResizePolicy::Reject`].
    pub fn new(
        base: &DynamicImage,
        overlay: &DynamicImage,
        options: CompositeOptions,
    ) -> Result<Self> {
        let base = base.to_rgba8();
        let overlay = overlay.to_rgba8();
        let (width, height) = base.dimensions();
        let overlay = match resize_filter(&overlay, width, height, options.resize)? {
            None => overlay,
            Some(filter) => stretch(&overlay, width, height, filter),
        };
        Ok(Self {
            base,
            overlay,
            options,
        })
    }

    /// Load base and overlay from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::ImageFormat`] if either file cannot
    /// be loaded, or [`Error::Dimension`] as for [`SparkleAssets::new`].
    pub fn open(base: &Path, overlay: &Path, options: CompositeOptions) -> Result<Self> {
        let base_img = load_image(base)?;
        let overlay_img = load_image(overlay)?;
        tracing::debug!(
            base = %base.display(),
            overlay = %overlay.display(),
            "loaded compositing assets"
        );
        Self::new(&base_img, &overlay_img, options)
    }

    /// Render a composite, using the configured opacity when `opacity` is `None`.
    ///
    /// # Errors
    ///
    /// Cannot fail in practice; the overlay was normalized at construction.
    pub fn render(&self, opacity: Option<f32>) -> Result<RgbaImage> {
        let opacity = opacity.unwrap_or(self.options.opacity);
        blending::blend_layers(&self.base, &self.overlay, opacity, self.options.alpha_mode)
    }

    /// Render a composite and encode it as PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if PNG encoding fails.
    pub fn render_png(&self, opacity: Option<f32>) -> Result<Vec<u8>> {
        encode_png(&self.render(opacity)?)
    }

    /// The base image in RGBA form.
    #[must_use]
    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    /// The overlay, already at the base's dimensions.
    #[must_use]
    pub fn overlay(&self) -> &RgbaImage {
        &self.overlay
    }

    /// The options this context was built with.
    #[must_use]
    pub fn options(&self) -> &CompositeOptions {
        &self.options
    }
}

/// Result of compositing onto a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the base image.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the overlay had to be stretched to fit this base.
    pub resized: bool,
    /// Human-readable status message.
    pub message: String,
}

/// Applies one overlay to many base images.
///
/// Create once with [`SparkleEngine::new()`] or [`SparkleEngine::open()`] and
/// reuse for every base image.
#[derive(Debug, Clone)]
pub struct SparkleEngine {
    overlay: RgbaImage,
    options: CompositeOptions,
}

impl SparkleEngine {
    /// Create an engine around an already-decoded overlay.
    #[must_use]
    pub fn new(overlay: &DynamicImage, options: CompositeOptions) -> Self {
        Self {
            overlay: overlay.to_rgba8(),
            options,
        }
    }

    /// Create an engine by loading the overlay from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::ImageFormat`] if the overlay cannot
    /// be loaded.
    pub fn open(overlay: &Path, options: CompositeOptions) -> Result<Self> {
        Ok(Self::new(&load_image(overlay)?, options))
    }

    /// The options this engine applies.
    #[must_use]
    pub fn options(&self) -> &CompositeOptions {
        &self.options
    }

    /// Composite the overlay onto `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dimension`] on mismatch under [`ResizePolicy::Reject`].
    pub fn apply(&self, base: &DynamicImage) -> Result<RgbaImage> {
        let base = base.to_rgba8();
        let overlay = fit_overlay(&self.overlay, base.width(), base.height(), self.options.resize)?;
        blending::blend_layers(&base, &overlay, self.options.opacity, self.options.alpha_mode)
    }

    /// Process a single image file: load, composite, save.
    ///
    /// Never panics; failures are reported in the returned [`ProcessResult`].
    #[must_use]
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        let mut result = ProcessResult {
            path: input.to_path_buf(),
            success: false,
            resized: false,
            message: String::new(),
        };

        let base = match load_image(input) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load base image");
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };
        let composite = match self.apply(&base) {
            Ok(img) => {
                result.resized = matches!(self.options.resize, ResizePolicy::Stretch(_))
                    && self.overlay.dimensions() != (base.width(), base.height());
                img
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to composite");
                result.message = format!("Failed to composite: {e}");
                return result;
            }
        };

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    result.message = format!("Failed to create output directory: {e}");
                    return result;
                }
            }
        }

        match save_image(&composite, output) {
            Ok(()) => {
                result.success = true;
                result.message = format!("Saved {}", output.display());
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to save composite");
                result.message = format!("Failed to save: {e}");
            }
        }

        result
    }

    /// Process all supported images in a directory.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    /// Each output keeps its input's file name inside `output_dir`.
    #[must_use]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Vec<ProcessResult> {
        let entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult {
                    path: input_dir.to_path_buf(),
                    success: false,
                    resized: false,
                    message: format!("Failed to read directory: {e}"),
                }];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult {
                    path: output_dir.to_path_buf(),
                    success: false,
                    resized: false,
                    message: format!("Failed to create output directory: {e}"),
                }];
            }
        }

        tracing::debug!(count = entries.len(), dir = %input_dir.display(), "processing directory");

        let process = |input: &PathBuf| {
            let output = match input.file_name() {
                Some(name) => output_dir.join(name),
                None => output_dir.to_path_buf(),
            };
            self.process_file(input, &output)
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(process).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            entries.iter().map(process).collect()
        }
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save an RGBA image, choosing the encoder from the file extension.
///
/// PNG, WebP and BMP keep the alpha channel. JPEG drops it and is written at
/// quality 100.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).into_rgb8();
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Encode an RGBA image as PNG bytes, e.g. for an HTTP response body.
///
/// # Errors
///
/// Returns [`Error::Image`] if encoding fails.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Generate a default output path from an input path.
///
/// Example: `"treasure.png"` becomes `"treasure_sparkled.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_sparkled.{ext}"))
}
