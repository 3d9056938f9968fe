//! # Image Descriptors
//!
//! Responsive-image descriptors for assets served by a remote image
//! transformation API. Given an asset (URL, content type, intrinsic size) and
//! some display constraints, this crate computes everything an `<img>` or
//! `<picture>` element needs: `src`, `srcset`, `sizes`, aspect ratio, and an
//! optional placeholder shown while the full image loads.
//!
//! The crate never decodes pixels. It negotiates URLs with the API and caches
//! the tiny placeholder renditions it fetches from it.
//!
//! # Architecture
//!
//! ```text
//! DescriptorService::resolve
//!     ├── imaging      (sync)  source + request → URLs and candidate sets
//!     └── placeholder  (async) source → data URI, fetched at most once
//!             ├── cache   memory map + disk store keyed by SHA-1 of the URL
//!             └── fetch   HTTP
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Variant planner: fixed, fluid and resize descriptors; URL encoding |
//! | [`placeholder`] | Single-flight, two-tier placeholder cache returning shared futures |
//! | [`cache`] | `BlobStore` trait, on-disk store, `get_or_compute`, persist policy, stats |
//! | [`fetch`] | `Fetcher` trait and the `reqwest` implementation |
//! | [`descriptor`] | Facade composing the above with host collaborators |
//! | [`config`] | `config.toml` loading, validation, merging, environment overrides |
//! | [`types`] | Inputs and outputs shared by every module |
//!
//! # Design Decisions
//!
//! ## Normalize, Then Plan
//!
//! Every implicit default (400px fixed width, 800px fluid container, `fill`
//! when cropping to an explicit box, the default `sizes` hint) is applied in
//! one place, [`imaging::FixedPlan::normalize`] and friends. Candidate
//! generation only ever sees fully-resolved plans, which keeps the width math
//! free of conditionals and trivially testable.
//!
//! ## Never Upscale, Never Exceed the API
//!
//! A candidate is dropped if it is wider than the original or if either of
//! its sides exceeds [`imaging::MAX_DIMENSION`]. The API would reject or
//! silently clamp such requests; filtering them up front keeps every URL in a
//! `srcset` honest about the pixels it returns.
//!
//! ## Placeholders Are Always Futures
//!
//! [`placeholder::PlaceholderCache::get_placeholder`] returns a
//! [`placeholder::PlaceholderHandle`] whether the value is settled, in flight
//! or not yet requested. Callers have one code path; a settled handle simply
//! resolves on first poll.
//!
//! ## Ineligible Is Not an Error
//!
//! Sources that are not raster images, or lack dimensions, produce `None`
//! from every planner and from the placeholder cache. Only I/O can fail.

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod fetch;
pub mod imaging;
pub mod placeholder;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::{Settings, load_config};
pub use descriptor::{
    AssetMaterializer, CollaboratorError, DescriptorError, DescriptorMode, DescriptorRequest,
    DescriptorService, PlaceholderStrategy, PostProcessor,
};
pub use placeholder::{PlaceholderCache, PlaceholderError, PlaceholderHandle};
pub use types::{ImageDescriptor, ImageSource, Placeholder, VariantRequest};
