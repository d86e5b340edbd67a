//! Alpha blending math for overlay compositing.
//!
//! The overlay is blended onto the base with straight (non-premultiplied)
//! source-over:
//!
//! ```text
//! out_a = sa + da * (1 - sa)
//! out_c = (sc * sa + dc * da * (1 - sa)) / out_a
//! ```
//!
//! where `sa` is the overlay alpha after opacity scaling.

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};

/// How opacity is turned into the overlay's effective per-pixel alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    /// Scale the overlay's own alpha by the opacity, keeping its transparency pattern.
    #[default]
    Scale,
    /// Replace the overlay's alpha with a uniform `255 * opacity`, truncated.
    Replace,
}

impl AlphaMode {
    /// Effective alpha for an overlay pixel with the given original alpha.
    #[must_use]
    pub fn effective_alpha(self, alpha: u8, opacity: f32) -> u8 {
        match self {
            AlphaMode::Scale => scale_alpha(alpha, opacity),
            AlphaMode::Replace => uniform_alpha(opacity),
        }
    }
}

/// Scale an 8-bit alpha by `opacity`, rounding and saturating into `[0, 255]`.
///
/// Opacity is not validated; NaN yields 0.
#[must_use]
pub fn scale_alpha(alpha: u8, opacity: f32) -> u8 {
    to_channel(f32::from(alpha) * opacity)
}

/// Uniform alpha for [`AlphaMode::Replace`]: `255 * opacity` truncated toward
/// zero and saturated into `[0, 255]`.
#[must_use]
pub fn uniform_alpha(opacity: f32) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (f32::from(u8::MAX) * opacity).clamp(0.0, 255.0) as u8
    }
}

/// Blend one overlay pixel over one base pixel.
///
/// The overlay's alpha channel must already hold its effective alpha.
/// A fully transparent overlay pixel returns the base pixel untouched.
#[must_use]
pub fn alpha_over(base: Rgba<u8>, overlay: Rgba<u8>) -> Rgba<u8> {
    if overlay[3] == 0 {
        return base;
    }

    let sa = f32::from(overlay[3]) / 255.0;
    let da = f32::from(base[3]) / 255.0;
    let inv_sa = 1.0 - sa;
    let out_a = sa + da * inv_sa;

    let mut out = base;
    for ch in 0..3 {
        let premul = f32::from(overlay[ch]) * sa + f32::from(base[ch]) * da * inv_sa;
        out[ch] = to_channel(premul / out_a);
    }
    out[3] = to_channel(out_a * 255.0);
    out
}

/// Composite `overlay` onto a copy of `base` at the given opacity.
///
/// Both images must have identical dimensions; neither is modified.
///
/// # Errors
///
/// Returns [`Error::Dimension`] if the dimensions differ.
pub fn blend_layers(
    base: &RgbaImage,
    overlay: &RgbaImage,
    opacity: f32,
    mode: AlphaMode,
) -> Result<RgbaImage> {
    if base.dimensions() != overlay.dimensions() {
        return Err(Error::Dimension {
            base_width: base.width(),
            base_height: base.height(),
            overlay_width: overlay.width(),
            overlay_height: overlay.height(),
        });
    }

    let mut out = base.clone();
    for (dst, src) in out.pixels_mut().zip(overlay.pixels()) {
        let mut layer = *src;
        layer[3] = mode.effective_alpha(src[3], opacity);
        *dst = alpha_over(*dst, layer);
    }
    Ok(out)
}

pub(crate) fn to_channel(value: f32) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        value.round().clamp(0.0, 255.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_alpha_rounds_and_saturates() {
        assert_eq!(scale_alpha(200, 0.0), 0);
        assert_eq!(scale_alpha(200, 1.0), 200);
        assert_eq!(scale_alpha(200, 0.25), 50);
        assert_eq!(scale_alpha(101, 0.5), 51);
        assert_eq!(scale_alpha(200, 2.0), 255);
        assert_eq!(scale_alpha(200, -1.0), 0);
        assert_eq!(scale_alpha(200, f32::NAN), 0);
    }

    #[test]
    fn replace_mode_ignores_overlay_alpha() {
        assert_eq!(AlphaMode::Replace.effective_alpha(0, 0.5), 127);
        assert_eq!(AlphaMode::Replace.effective_alpha(255, 0.5), 127);
        assert_eq!(AlphaMode::Scale.effective_alpha(0, 0.5), 0);
    }

    #[test]
    fn uniform_alpha_truncates() {
        assert_eq!(uniform_alpha(0.5), 127);
        assert_eq!(uniform_alpha(0.999), 254);
        assert_eq!(uniform_alpha(1.0), 255);
        assert_eq!(uniform_alpha(0.0), 0);
        assert_eq!(uniform_alpha(1.5), 255);
        assert_eq!(uniform_alpha(-0.5), 0);
    }

    #[test]
    fn over_transparent_overlay_is_noop() {
        let base = Rgba([10, 20, 30, 40]);
        assert_eq!(alpha_over(base, Rgba([255, 255, 255, 0])), base);
    }

    #[test]
    fn over_opaque_overlay_replaces_base() {
        let base = Rgba([0, 0, 0, 255]);
        let overlay = Rgba([255, 0, 0, 255]);
        assert_eq!(alpha_over(base, overlay), overlay);
    }

    #[test]
    fn over_transparent_base_returns_overlay() {
        let base = Rgba([0, 0, 0, 0]);
        let overlay = Rgba([100, 110, 120, 200]);
        assert_eq!(alpha_over(base, overlay), overlay);
    }

    #[test]
    fn over_half_alpha_on_opaque_base_mixes_evenly() {
        let base = Rgba([0, 100, 200, 255]);
        let overlay = Rgba([200, 100, 0, 128]);
        let out = alpha_over(base, overlay);
        assert_eq!(out[3], 255);
        for (ch, expected) in [(0, 100), (1, 100), (2, 100)] {
            let diff = (i32::from(out[ch]) - expected).abs();
            assert!(diff <= 1, "ch {ch}: got {}, expected ~{expected}", out[ch]);
        }
    }

    #[test]
    fn over_semi_transparent_layers_union_alpha() {
        let base = Rgba([0, 0, 0, 128]);
        let overlay = Rgba([255, 255, 255, 128]);
        let out = alpha_over(base, overlay);
        // 0.502 + 0.502 * 0.498 ≈ 0.752
        assert_eq!(out[3], 192);
    }

    #[test]
    fn blend_layers_rejects_mismatched_dimensions() {
        let base = RgbaImage::new(4, 4);
        let overlay = RgbaImage::new(2, 4);
        let err = blend_layers(&base, &overlay, 1.0, AlphaMode::Scale).unwrap_err();
        assert!(matches!(
            err,
            Error::Dimension {
                base_width: 4,
                overlay_width: 2,
                ..
            }
        ));
    }

    #[test]
    fn blend_layers_leaves_inputs_untouched() {
        let base = RgbaImage::from_pixel(3, 3, Rgba([10, 10, 10, 255]));
        let overlay = RgbaImage::from_pixel(3, 3, Rgba([250, 250, 250, 255]));
        let base_copy = base.clone();
        let overlay_copy = overlay.clone();

        let out = blend_layers(&base, &overlay, 1.0, AlphaMode::Scale).unwrap();

        assert_eq!(base, base_copy);
        assert_eq!(overlay, overlay_copy);
        assert_eq!(*out.get_pixel(1, 1), Rgba([250, 250, 250, 255]));
    }
}
