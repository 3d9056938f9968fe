//! Transformation URL construction.
//!
//! The image API reads its options from the query string of the asset's base
//! URL. Parameter order is fixed so equal options always produce equal URLs,
//! which keeps downstream caches (CDN, browser, placeholder disk cache) warm.

use super::params::TransformOptions;
use crate::types::ImageFormat;
use url::form_urlencoded;

/// Build the URL for one rendition.
///
/// Absent, zero and empty options are omitted. `fl=progressive` is only sent
/// for JPEG output. The `?` separator is always present, even with no options.
pub fn build_transform_url(base_url: &str, options: &TransformOptions) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());

    if let Some(w) = options.width.filter(|&w| w > 0) {
        query.append_pair("w", &w.to_string());
    }
    if let Some(h) = options.height.filter(|&h| h > 0) {
        query.append_pair("h", &h.to_string());
    }
    if options.progressive && options.format == Some(ImageFormat::Jpg) {
        query.append_pair("fl", "progressive");
    }
    if let Some(q) = options.quality {
        query.append_pair("q", &q.value().to_string());
    }
    if let Some(fm) = options.format {
        query.append_pair("fm", fm.as_str());
    }
    if let Some(fit) = options.resizing_behavior {
        query.append_pair("fit", fit.as_str());
    }
    if let Some(focus) = options.crop_focus {
        query.append_pair("f", focus.as_str());
    }
    if let Some(bg) = options.background.as_deref().filter(|bg| !bg.is_empty()) {
        query.append_pair("bg", bg);
    }

    format!("{base_url}?{}", query.finish())
}

/// Convert CSS hex notation to the API's color syntax: `#rrggbb` → `rgb:rrggbb`.
///
/// Values without a leading `#` pass through unchanged.
pub fn normalize_background(background: &str) -> String {
    match background.strip_prefix('#') {
        Some(hex) => format!("rgb:{hex}"),
        None => background.to_string(),
    }
}
