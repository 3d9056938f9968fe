//! Pure calculation functions for variant dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Intermediate math is `f64`; pixel values are rounded half away from zero
//! at the point they leave this module.

/// Largest width or height the image API will render.
pub const MAX_DIMENSION: u32 = 4000;

/// Fixed-mode candidate multipliers and their `srcset` density labels.
pub const DENSITIES: [(f64, &str); 4] = [(1.0, "1x"), (1.5, "1.5x"), (2.0, "2x"), (3.0, "3x")];

/// Fluid-mode candidate multipliers of the maximum display width.
pub const FLUID_STEPS: [f64; 6] = [0.25, 0.5, 1.0, 1.5, 2.0, 3.0];

/// Width divided by height.
pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    width as f64 / height as f64
}

/// Round a pixel measurement to the nearest integer, half away from zero.
pub fn round_px(value: f64) -> u32 {
    value.round() as u32
}

/// Height of a `width`-wide rendition at the given aspect ratio.
pub fn derive_height(width: u32, aspect_ratio: f64) -> u32 {
    round_px(width as f64 / aspect_ratio)
}

/// Width of a `height`-tall rendition at the given aspect ratio.
pub fn derive_width(height: u32, aspect_ratio: f64) -> u32 {
    round_px(height as f64 * aspect_ratio)
}

/// A single rendition size to request from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsiveSize {
    pub width: u32,
    pub height: u32,
}

/// A fixed-mode rendition together with its pixel-density label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensitySize {
    pub size: ResponsiveSize,
    pub density: &'static str,
}

/// Whether a candidate width is renderable and not an upscale.
///
/// Both the width and the height it implies must be within
/// [`MAX_DIMENSION`], and the width must not exceed the original.
pub fn within_limits(width: u32, aspect_ratio: f64, intrinsic_width: u32) -> bool {
    width > 0
        && width <= MAX_DIMENSION
        && derive_height(width, aspect_ratio) <= MAX_DIMENSION
        && width <= intrinsic_width
}

/// Calculate the density variants for a fixed display width.
///
/// Candidates are `width × {1, 1.5, 2, 3}`. Candidates beyond the API limit
/// or wider than the original are dropped; the rest are returned in
/// ascending width order with duplicate widths collapsed to the first label.
pub fn calculate_fixed_sizes(
    width: u32,
    aspect_ratio: f64,
    intrinsic_width: u32,
) -> Vec<DensitySize> {
    let mut sizes: Vec<DensitySize> = DENSITIES
        .iter()
        .map(|&(factor, density)| (round_px(width as f64 * factor), density))
        .filter(|&(w, _)| within_limits(w, aspect_ratio, intrinsic_width))
        .map(|(w, density)| DensitySize {
            size: ResponsiveSize {
                width: w,
                height: derive_height(w, aspect_ratio),
            },
            density,
        })
        .collect();

    sizes.sort_by_key(|s| s.size.width);
    sizes.dedup_by_key(|s| s.size.width);
    sizes
}

/// Calculate the width ladder for a fluid container.
///
/// Candidates are `max_width × {¼, ½, 1, 1.5, 2, 3}`, filtered like
/// [`calculate_fixed_sizes`]. The original width is appended when it is not
/// already present and fits the API limit, so small sources always offer
/// their full resolution.
pub fn calculate_fluid_sizes(
    max_width: u32,
    aspect_ratio: f64,
    intrinsic_width: u32,
) -> Vec<ResponsiveSize> {
    let mut widths: Vec<u32> = FLUID_STEPS
        .iter()
        .map(|&step| round_px(max_width as f64 * step))
        .filter(|&w| within_limits(w, aspect_ratio, intrinsic_width))
        .collect();

    if !widths.contains(&intrinsic_width)
        && within_limits(intrinsic_width, aspect_ratio, intrinsic_width)
    {
        widths.push(intrinsic_width);
    }

    widths.sort_unstable();
    widths.dedup();
    widths
        .into_iter()
        .map(|width| ResponsiveSize {
            width,
            height: derive_height(width, aspect_ratio),
        })
        .collect()
}
