//! Variant planning: pure, deterministic, no I/O.
//!
//! | Mode | Function | `srcset` descriptors |
//! |---|---|---|
//! | **Fixed** | [`resolve_fixed`] | density (`1x`, `1.5x`, `2x`, `3x`) |
//! | **Fluid** | [`resolve_fluid`] | width (`200w`, `400w`, …) |
//! | **Resize** | [`resolve_resize`] | none (single URL) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for candidate-width math (unit testable)
//! - **Parameters**: Normalized plans with every default applied
//! - **URL**: Transformation URL encoding
//! - **Operations**: High-level functions combining the three

mod calculations;
pub mod operations;
mod params;
mod url;

pub use calculations::MAX_DIMENSION;
pub use operations::{resolve_fixed, resolve_fluid, resolve_resize, webp_companion_request};
pub use params::{FixedPlan, FluidPlan, Quality, ResizePlan, TransformOptions, default_sizes};
pub use url::{build_transform_url, normalize_background};
