//! Per-object trait measurement.
//!
//! Measurements land in a per-run [`Observations`] store keyed
//! `plant_<id>`, which the result assembler reads back.

use std::collections::BTreeMap;

use image::RgbImage;

pub mod index;
pub mod shape;

pub use index::{IndexStats, SpectralIndex};
pub use shape::ShapeTraits;

use crate::color::generate_palette;
use crate::data::model::{LabeledObjectMap, SpectralCube};
use crate::error::Result;
use crate::settings::GeneralOptions;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which analyses run, and on which index.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisModes {
    pub analyze_index: bool,
    pub selected_index: String,
    pub analyze_shape: bool,
}

impl From<&GeneralOptions> for AnalysisModes {
    fn from(general: &GeneralOptions) -> Self {
        AnalysisModes {
            analyze_index: general.analyze_index,
            selected_index: general.index_selection.clone(),
            analyze_shape: general.analyze_shape,
        }
    }
}

/// Drawing parameters for annotated previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub line_width: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig { line_width: 1 }
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// What was measured for one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectObservations {
    pub shape: Option<ShapeTraits>,
    pub index: Option<IndexStats>,
}

pub fn observation_key(id: u32) -> String {
    format!("plant_{id}")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observations {
    entries: BTreeMap<String, ObjectObservations>,
}

impl Observations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u32) -> Option<&ObjectObservations> {
        self.entries.get(&observation_key(id))
    }

    pub fn entry(&mut self, id: u32) -> &mut ObjectObservations {
        self.entries.entry(observation_key(id)).or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Measurements plus the preview image to publish.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub observations: Observations,
    pub annotated: RgbImage,
}

/// Run the enabled analyses over every labeled object.
///
/// The preview is the cube's pseudo-RGB image, with object outlines drawn
/// in when shape analysis runs.
pub fn analyze(
    cube: &SpectralCube,
    labels: &LabeledObjectMap,
    modes: &AnalysisModes,
    config: &AnalysisConfig,
) -> Result<Analysis> {
    let mut observations = Observations::new();
    let mut annotated = cube.pseudo_rgb.clone();
    let n = labels.count();

    let index_image = if modes.analyze_index {
        let selected = SpectralIndex::from_key(&modes.selected_index)?;
        Some(selected.compute(cube, index::WAVELENGTH_DISTANCE)?)
    } else {
        None
    };

    for id in 1..=n {
        let pixels = labels.pixels_of(id);
        if pixels.is_empty() {
            continue;
        }

        if let Some(image) = &index_image {
            let values = pixels.iter().map(|&(r, c)| image[[r, c]]).collect();
            observations.entry(id).index = index::index_stats(values);
        }
        if modes.analyze_shape {
            observations.entry(id).shape = shape::measure(&pixels);
        }
    }

    if modes.analyze_shape {
        let colors = generate_palette(n as usize);
        shape::annotate(&mut annotated, labels, &colors, config.line_width);
    }

    log::info!("Analyzed {} of {n} objects", observations.len());
    Ok(Analysis {
        observations,
        annotated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::DataType;
    use crate::error::AnalysisError;
    use ndarray::{Array2, Array3};
    use std::path::PathBuf;

    fn fixture() -> (SpectralCube, LabeledObjectMap) {
        // NDVI = 0.5 on the left object, 0 on the right object
        let array_data = Array3::from_shape_fn((4, 8, 2), |(_, c, b)| match (c < 4, b) {
            (true, 0) => 0.2,
            (true, _) => 0.6,
            _ => 0.3,
        });
        let cube = SpectralCube {
            array_data,
            wavelengths: vec![670.0, 800.0],
            pseudo_rgb: RgbImage::new(8, 4),
            filename: PathBuf::from("a.hdr"),
            d_type: DataType::F32,
        };
        let labels = Array2::from_shape_fn((4, 8), |(r, c)| match (r, c) {
            (1..=2, 1..=2) => 1,
            (1..=2, 5..=6) => 2,
            _ => 0,
        });
        (cube, LabeledObjectMap::new(labels, 2))
    }

    fn modes(analyze_index: bool, analyze_shape: bool) -> AnalysisModes {
        AnalysisModes {
            analyze_index,
            selected_index: "ndvi".to_string(),
            analyze_shape,
        }
    }

    #[test]
    fn both_modes_fill_one_record_per_object() {
        let (cube, labels) = fixture();
        let analysis = analyze(&cube, &labels, &modes(true, true), &AnalysisConfig::default()).unwrap();
        let first = analysis.observations.get(1).unwrap();
        assert_eq!(first.shape.unwrap().area, 4.0);
        assert!((first.index.unwrap().mean - 0.5).abs() < 1e-6);
        assert_eq!(analysis.observations.get(2).unwrap().index.unwrap().mean, 0.0);
        assert_ne!(analysis.annotated, cube.pseudo_rgb);
    }

    #[test]
    fn index_only_leaves_shape_and_preview_untouched() {
        let (cube, labels) = fixture();
        let analysis = analyze(&cube, &labels, &modes(true, false), &AnalysisConfig::default()).unwrap();
        assert!(analysis.observations.get(1).unwrap().shape.is_none());
        assert_eq!(analysis.annotated, cube.pseudo_rgb);
    }

    #[test]
    fn no_mode_measures_nothing() {
        let (cube, labels) = fixture();
        let analysis = analyze(&cube, &labels, &modes(false, false), &AnalysisConfig::default()).unwrap();
        assert!(analysis.observations.is_empty());
    }

    #[test]
    fn unknown_index_is_fatal() {
        let (cube, labels) = fixture();
        let mut m = modes(true, false);
        m.selected_index = "nope".into();
        assert!(matches!(
            analyze(&cube, &labels, &m, &AnalysisConfig::default()),
            Err(AnalysisError::UnknownIndexSelection(_))
        ));
    }
}
