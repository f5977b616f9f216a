//! Mask layer: turns a prepared cube into a plant/background mask.
//!
//! ```text
//!   SpectralCube ──▶ MaskStrategy::build ──▶ (SpectralCube, Mask)
//!                        ▲                         │
//!                 MaskRegistry                      ▼
//!          ("default" = ThresholdMask)      preview PNG (optional)
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod morphology;
pub mod preview;
pub mod threshold;

pub use threshold::ThresholdMask;

use crate::data::model::{Mask, SpectralCube};
use crate::data::prepare::prepare_spectral_data;
use crate::error::{AnalysisError, Result};
use crate::settings::{MaskOptions, Settings};
use crate::warnings::Warnings;

// ---------------------------------------------------------------------------
// Strategy contract
// ---------------------------------------------------------------------------

/// A way of separating plants from background.
///
/// Implementations hand the cube back together with the mask so a strategy
/// may swap in a transformed cube (e.g. cropped or re-normalized).
pub trait MaskStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn build(
        &self,
        cube: SpectralCube,
        options: &MaskOptions,
        warnings: &mut Warnings,
    ) -> Result<(SpectralCube, Mask)>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub const DEFAULT_STRATEGY: &str = "default";

/// Named mask strategies a run may select from its settings.
#[derive(Clone)]
pub struct MaskRegistry {
    strategies: BTreeMap<String, Arc<dyn MaskStrategy>>,
}

impl Default for MaskRegistry {
    fn default() -> Self {
        let mut registry = MaskRegistry {
            strategies: BTreeMap::new(),
        };
        registry.register(Arc::new(ThresholdMask));
        registry
    }
}

impl fmt::Debug for MaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.strategies.keys()).finish()
    }
}

impl MaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy under its own name, replacing any previous one.
    pub fn register(&mut self, strategy: Arc<dyn MaskStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn MaskStrategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| AnalysisError::UnknownMaskStrategy(name.to_string()))
    }

    /// Strategy named by the settings, or the default one.
    pub fn select(&self, settings: &Settings) -> Result<Arc<dyn MaskStrategy>> {
        let name = settings
            .mask_strategy
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_STRATEGY);
        self.get(name)
    }
}

// ---------------------------------------------------------------------------
// Entry-point
// ---------------------------------------------------------------------------

/// Prepare the input cube and mask it.  With `mask_preview` set, the mask is
/// also written to `settings.output_image`, which must then be configured.
pub fn create_mask(
    settings: &Settings,
    strategy: &dyn MaskStrategy,
    mask_preview: bool,
    warnings: &mut Warnings,
) -> Result<(SpectralCube, Mask)> {
    let preview_path = match mask_preview {
        true => Some(settings.output_image.as_deref().ok_or(AnalysisError::MissingOutputImage)?),
        false => None,
    };

    let cube = prepare_spectral_data(settings)?;
    let (cube, mask) = strategy.build(cube, settings.mask_options(), warnings)?;

    if (mask.height(), mask.width()) != (cube.height(), cube.width()) {
        return Err(AnalysisError::ShapeMismatch {
            mask: (mask.height(), mask.width()),
            cube: (cube.height(), cube.width()),
        });
    }

    if let Some(path) = preview_path {
        preview::write_mask_preview(&mask, path)?;
    }
    Ok((cube, mask))
}
