//! Error types for the sparkle-compositor crate.

/// Errors that can occur while loading, compositing, or saving images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input could not be decoded as a raster image.
    #[error("failed to decode image: {0}")]
    ImageFormat(image::ImageError),

    /// Base and overlay dimensions differ and resizing is disabled.
    #[error(
        "overlay is {overlay_width}x{overlay_height} but base is {base_width}x{base_height} \
         and resizing is disabled"
    )]
    Dimension {
        /// Base width in pixels.
        base_width: u32,
        /// Base height in pixels.
        base_height: u32,
        /// Overlay width in pixels.
        overlay_width: u32,
        /// Overlay height in pixels.
        overlay_height: u32,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred while encoding or saving an image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Classify an error raised while opening or decoding an input image.
    ///
    /// Missing or unreadable files become [`Error::Io`]; everything else is
    /// treated as undecodable content.
    pub(crate) fn from_decode(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => Error::Io(io),
            other => Error::ImageFormat(other),
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let dims = Error::Dimension {
            base_width: 100,
            base_height: 80,
            overlay_width: 50,
            overlay_height: 40,
        };
        let msg = dims.to_string();
        assert!(msg.contains("50x40"));
        assert!(msg.contains("100x80"));
    }

    #[test]
    fn decode_errors_split_io_from_format() {
        let io = image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(matches!(Error::from_decode(io), Error::Io(_)));

        let bad = image::load_from_memory(b"definitely not an image").unwrap_err();
        assert!(matches!(Error::from_decode(bad), Error::ImageFormat(_)));
    }
}
