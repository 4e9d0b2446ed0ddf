//! Pure calculation functions for variant dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Output dimensions of one width variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSize {
    pub width: u32,
    pub height: u32,
}

/// Height of an image scaled to `width`, preserving the original aspect ratio.
///
/// Never returns zero, so extreme panoramas still produce a valid image.
///
/// # Examples
/// ```
/// # use sitepress::imaging::scaled_height;
/// assert_eq!(scaled_height((2400, 1600), 1200), 800);
/// assert_eq!(scaled_height((1000, 1000), 480), 480);
/// ```
pub fn scaled_height(original: (u32, u32), width: u32) -> u32 {
    let (orig_w, orig_h) = original;
    if orig_w == 0 {
        return orig_h.max(1);
    }
    let h = (orig_h as f64 * width as f64 / orig_w as f64).round() as u32;
    h.max(1)
}

/// Dimensions for every requested width, in the order given.
///
/// Every width is produced, including widths larger than the source: the
/// variant set is fixed so page markup can reference it unconditionally.
pub fn variant_sizes(original: (u32, u32), widths: &[u32]) -> Vec<VariantSize> {
    widths
        .iter()
        .map(|&width| VariantSize {
            width,
            height: scaled_height(original, width),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_scales_height_down() {
        // 2000x1500, 480 wide → 360 high
        assert_eq!(scaled_height((2000, 1500), 480), 360);
    }

    #[test]
    fn portrait_scales_height_up_relative_to_width() {
        // 1500x2000, 768 wide → 1024 high
        assert_eq!(scaled_height((1500, 2000), 768), 1024);
    }

    #[test]
    fn height_rounds_to_nearest() {
        // 1000x333 at 480 → 159.84 → 160
        assert_eq!(scaled_height((1000, 333), 480), 160);
    }

    #[test]
    fn height_never_zero() {
        assert_eq!(scaled_height((10000, 1), 480), 1);
        assert_eq!(scaled_height((0, 10), 480), 10);
    }

    #[test]
    fn variant_sizes_preserve_order_and_include_upscales() {
        let sizes = variant_sizes((800, 600), &[480, 768, 1200]);
        assert_eq!(
            sizes,
            vec![
                VariantSize { width: 480, height: 360 },
                VariantSize { width: 768, height: 576 },
                VariantSize { width: 1200, height: 900 },
            ]
        );
    }

    #[test]
    fn variant_sizes_empty_widths() {
        assert!(variant_sizes((800, 600), &[]).is_empty());
    }
}
