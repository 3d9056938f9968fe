//! Descriptor facade: one external request in, one descriptor out.
//!
//! ```text
//! ImageSource + DescriptorRequest
//!     → geometry check        (ineligible ⇒ Ok(None), nothing else runs)
//!     → mode                  (explicit, or inferred from populated fields)
//!     → planner               (imaging::resolve_fixed / _fluid / _resize)
//!     → WebP companion        (fixed and fluid only)
//!     → placeholder strategy  (blurred / dominant color / traced SVG)
//!     → ImageDescriptor
//! ```
//!
//! Dominant-color and traced-SVG placeholders need the original file on
//! local disk. Downloading it ([`AssetMaterializer`]) and analysing it
//! ([`PostProcessor`]) are host capabilities injected at construction.

use crate::config::Settings;
use crate::fetch::FetchError;
use crate::imaging::{
    normalize_background, resolve_fixed, resolve_fluid, resolve_resize, webp_companion_request,
};
use crate::placeholder::{PlaceholderCache, PlaceholderError};
use crate::types::{ImageDescriptor, ImageSource, Placeholder, VariantRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure reported by a host collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    pub message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("failed to materialize {base_url}: {source}")]
    Materialize {
        base_url: String,
        #[source]
        source: CollaboratorError,
    },
    #[error("failed to trace {path}: {source}")]
    Trace {
        path: PathBuf,
        #[source]
        source: CollaboratorError,
    },
    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),
}

/// Downloads the original asset to local disk.
#[async_trait]
pub trait AssetMaterializer: Send + Sync {
    /// Absolute path of the local copy.
    async fn materialize(
        &self,
        source: &ImageSource,
        request: &VariantRequest,
    ) -> Result<PathBuf, CollaboratorError>;
}

/// Image analysis the crate does not perform itself.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// SVG markup traced from the image at `path`.
    async fn trace_to_vector(&self, path: &Path) -> Result<String, CollaboratorError>;

    /// CSS color of the image's dominant color.
    async fn dominant_color(&self, path: &Path) -> Result<String, CollaboratorError>;
}

/// Which planner a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorMode {
    Fixed,
    Fluid,
    Resize,
}

impl DescriptorMode {
    /// Fluid when any container constraint is present, fixed otherwise.
    ///
    /// Resize is never inferred; it must be asked for.
    pub fn infer(request: &VariantRequest) -> Self {
        if request.requested_max_width().is_some()
            || request.requested_max_height().is_some()
            || request.requested_sizes().is_some()
        {
            DescriptorMode::Fluid
        } else {
            DescriptorMode::Fixed
        }
    }

    pub fn plan(self, source: &ImageSource, request: &VariantRequest) -> Option<ImageDescriptor> {
        match self {
            DescriptorMode::Fixed => resolve_fixed(source, request),
            DescriptorMode::Fluid => resolve_fluid(source, request),
            DescriptorMode::Resize => resolve_resize(source, request),
        }
    }
}

/// Which stand-in to attach while the full image loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaceholderStrategy {
    Blurred,
    DominantColor,
    TracedSvg,
}

/// A full-descriptor request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DescriptorRequest {
    #[serde(flatten)]
    pub variant: VariantRequest,
    /// `None` infers the mode from `variant`.
    pub mode: Option<DescriptorMode>,
    pub placeholder: Option<PlaceholderStrategy>,
}

/// Composes the planner, the placeholder cache and the host collaborators.
#[derive(Clone)]
pub struct DescriptorService {
    placeholders: PlaceholderCache,
    materializer: Arc<dyn AssetMaterializer>,
    post_processor: Option<Arc<dyn PostProcessor>>,
    neutral_color: String,
}

impl DescriptorService {
    pub fn new(placeholders: PlaceholderCache, materializer: Arc<dyn AssetMaterializer>) -> Self {
        Self {
            placeholders,
            materializer,
            post_processor: None,
            neutral_color: "rgba(0,0,0,0.5)".to_string(),
        }
    }

    pub fn from_config(
        settings: &Settings,
        materializer: Arc<dyn AssetMaterializer>,
    ) -> Result<Self, FetchError> {
        let placeholders = PlaceholderCache::from_config(settings)?;
        Ok(Self::new(placeholders, materializer)
            .with_neutral_color(settings.placeholder.neutral_color.clone()))
    }

    pub fn with_post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    pub fn with_neutral_color(mut self, color: impl Into<String>) -> Self {
        self.neutral_color = color.into();
        self
    }

    pub fn placeholders(&self) -> &PlaceholderCache {
        &self.placeholders
    }

    /// Resolve a full descriptor.
    ///
    /// `Ok(None)` when the source is not a transformable image; no
    /// placeholder work happens in that case.
    pub async fn resolve(
        &self,
        source: &ImageSource,
        request: &DescriptorRequest,
    ) -> Result<Option<ImageDescriptor>, DescriptorError> {
        let mode = request
            .mode
            .unwrap_or_else(|| DescriptorMode::infer(&request.variant));

        let mut variant = request.variant.clone();
        variant.background = variant.background.as_deref().map(normalize_background);

        let Some(mut descriptor) = mode.plan(source, &variant) else {
            debug!(base_url = %source.base_url, "source is not transformable");
            return Ok(None);
        };

        if mode != DescriptorMode::Resize {
            let companion = webp_companion_request(source, &variant)
                .and_then(|webp| mode.plan(source, &webp));
            if let Some(companion) = companion {
                descriptor.src_webp = Some(companion.src);
                descriptor.src_set_webp = companion.src_set;
            }
        }

        if let Some(strategy) = request.placeholder {
            descriptor.placeholder = self.placeholder(strategy, source, &variant).await?;
        }

        Ok(Some(descriptor))
    }

    async fn placeholder(
        &self,
        strategy: PlaceholderStrategy,
        source: &ImageSource,
        variant: &VariantRequest,
    ) -> Result<Option<Placeholder>, DescriptorError> {
        match strategy {
            PlaceholderStrategy::Blurred => match self.placeholders.get_placeholder(source) {
                Some(handle) => Ok(Some(Placeholder::Blurred(handle.await?))),
                None => Ok(None),
            },
            PlaceholderStrategy::DominantColor => {
                let Some(post_processor) = &self.post_processor else {
                    warn!("no post-processor configured, using neutral color");
                    return Ok(Some(self.neutral()));
                };
                let path = self.materialize(source, variant).await?;
                match post_processor.dominant_color(&path).await {
                    Ok(color) => Ok(Some(Placeholder::Color(color))),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "dominant color failed, using neutral color");
                        Ok(Some(self.neutral()))
                    }
                }
            }
            PlaceholderStrategy::TracedSvg => {
                let Some(post_processor) = &self.post_processor else {
                    warn!("no post-processor configured, using neutral color");
                    return Ok(Some(self.neutral()));
                };
                let path = self.materialize(source, variant).await?;
                let svg = post_processor
                    .trace_to_vector(&path)
                    .await
                    .map_err(|source| DescriptorError::Trace {
                        path: path.clone(),
                        source,
                    })?;
                Ok(Some(Placeholder::TracedSvg(svg)))
            }
        }
    }

    async fn materialize(
        &self,
        source: &ImageSource,
        variant: &VariantRequest,
    ) -> Result<PathBuf, DescriptorError> {
        self.materializer
            .materialize(source, variant)
            .await
            .map_err(|err| DescriptorError::Materialize {
                base_url: source.base_url.clone(),
                source: err,
            })
    }

    fn neutral(&self) -> Placeholder {
        Placeholder::Color(self.neutral_color.clone())
    }
}
