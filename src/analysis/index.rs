use ndarray::Array2;

use crate::data::model::SpectralCube;
use crate::error::{AnalysisError, Result};

/// How far (nm) a required wavelength may lie outside the cube's range.
pub const WAVELENGTH_DISTANCE: f64 = 10.0;

// ---------------------------------------------------------------------------
// Index registry
// ---------------------------------------------------------------------------

/// Supported spectral indices.  `ALL` is the registry order shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectralIndex {
    Ndvi,
    Gdvi,
    Savi,
    Pri,
    Ndre,
    CiRededge,
    Sr,
    Sipi,
    Evi,
    Ari,
    Psri,
    Wi,
    Vari,
    Mcari,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 14] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Gdvi,
        SpectralIndex::Savi,
        SpectralIndex::Pri,
        SpectralIndex::Ndre,
        SpectralIndex::CiRededge,
        SpectralIndex::Sr,
        SpectralIndex::Sipi,
        SpectralIndex::Evi,
        SpectralIndex::Ari,
        SpectralIndex::Psri,
        SpectralIndex::Wi,
        SpectralIndex::Vari,
        SpectralIndex::Mcari,
    ];

    /// Settings key.
    pub fn key(self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Gdvi => "gdvi",
            SpectralIndex::Savi => "savi",
            SpectralIndex::Pri => "pri",
            SpectralIndex::Ndre => "ndre",
            SpectralIndex::CiRededge => "ci_rededge",
            SpectralIndex::Sr => "sr",
            SpectralIndex::Sipi => "sipi",
            SpectralIndex::Evi => "evi",
            SpectralIndex::Ari => "ari",
            SpectralIndex::Psri => "psri",
            SpectralIndex::Wi => "wi",
            SpectralIndex::Vari => "vari",
            SpectralIndex::Mcari => "mcari",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "Normalized Difference Vegetation Index (NDVI)",
            SpectralIndex::Gdvi => "Green Difference Vegetation Index (GDVI)",
            SpectralIndex::Savi => "Soil Adjusted Vegetation Index (SAVI)",
            SpectralIndex::Pri => "Photochemical Reflectance Index (PRI)",
            SpectralIndex::Ndre => "Normalized Difference Red Edge (NDRE)",
            SpectralIndex::CiRededge => "Chlorophyll Index Red Edge (CI rededge)",
            SpectralIndex::Sr => "Simple Ratio (SR)",
            SpectralIndex::Sipi => "Structure Insensitive Pigment Index (SIPI)",
            SpectralIndex::Evi => "Enhanced Vegetation Index (EVI)",
            SpectralIndex::Ari => "Anthocyanin Reflectance Index (ARI)",
            SpectralIndex::Psri => "Plant Senescence Reflectance Index (PSRI)",
            SpectralIndex::Wi => "Water Index (WI)",
            SpectralIndex::Vari => "Visible Atmospherically Resistant Index (VARI)",
            SpectralIndex::Mcari => "Modified Chlorophyll Absorption Ratio Index (MCARI)",
        }
    }

    pub fn from_key(key: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|idx| idx.key() == key)
            .ok_or_else(|| AnalysisError::UnknownIndexSelection(key.to_string()))
    }

    /// Wavelengths (nm) feeding the formula, in argument order.
    fn wavelengths(self) -> &'static [f64] {
        match self {
            SpectralIndex::Ndvi => &[800.0, 670.0],
            SpectralIndex::Gdvi => &[800.0, 550.0],
            SpectralIndex::Savi => &[800.0, 680.0],
            SpectralIndex::Pri => &[531.0, 570.0],
            SpectralIndex::Ndre => &[790.0, 720.0],
            SpectralIndex::CiRededge => &[800.0, 700.0],
            SpectralIndex::Sr => &[800.0, 680.0],
            SpectralIndex::Sipi => &[800.0, 445.0, 680.0],
            SpectralIndex::Evi => &[800.0, 670.0, 490.0],
            SpectralIndex::Ari => &[550.0, 700.0],
            SpectralIndex::Psri => &[678.0, 500.0, 750.0],
            SpectralIndex::Wi => &[900.0, 970.0],
            SpectralIndex::Vari => &[550.0, 670.0, 480.0],
            SpectralIndex::Mcari => &[700.0, 670.0, 550.0],
        }
    }

    /// Evaluate the formula on reflectances ordered as in `wavelengths`.
    fn formula(self, r: &[f32]) -> f32 {
        match self {
            SpectralIndex::Ndvi | SpectralIndex::Pri | SpectralIndex::Ndre => (r[0] - r[1]) / (r[0] + r[1]),
            SpectralIndex::Gdvi => r[0] - r[1],
            SpectralIndex::Savi => 1.5 * (r[0] - r[1]) / (r[0] + r[1] + 0.5),
            SpectralIndex::CiRededge => r[0] / r[1] - 1.0,
            SpectralIndex::Sr | SpectralIndex::Wi => r[0] / r[1],
            SpectralIndex::Sipi => (r[0] - r[1]) / (r[0] - r[2]),
            SpectralIndex::Evi => 2.5 * (r[0] - r[1]) / (1.0 + r[0] + 6.0 * r[1] - 7.5 * r[2]),
            SpectralIndex::Ari => 1.0 / r[0] - 1.0 / r[1],
            SpectralIndex::Psri => (r[0] - r[1]) / r[2],
            SpectralIndex::Vari => (r[0] - r[1]) / (r[0] + r[1] - r[2]),
            SpectralIndex::Mcari => ((r[0] - r[1]) - 0.2 * (r[0] - r[2])) * (r[0] / r[1]),
        }
    }

    /// Compute the index image.  Each required wavelength must lie within
    /// `distance` nm of the cube's range; the nearest band is used.
    /// Non-finite results (division by zero) become 0.
    pub fn compute(self, cube: &SpectralCube, distance: f64) -> Result<Array2<f32>> {
        let (min, max) = cube.wavelength_range().unwrap_or((f64::NAN, f64::NAN));
        let bands = self
            .wavelengths()
            .iter()
            .map(|&wl| {
                let in_range = wl >= min - distance && wl <= max + distance;
                cube.nearest_band(wl)
                    .filter(|_| in_range)
                    .ok_or(AnalysisError::IndexWavelengthUnavailable {
                        index: self.key(),
                        wavelength: wl,
                        min,
                        max,
                    })
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut reflectance = vec![0.0f32; bands.len()];
        Ok(Array2::from_shape_fn((cube.height(), cube.width()), |(r, c)| {
            for (slot, &band) in reflectance.iter_mut().zip(&bands) {
                *slot = cube.array_data[[r, c, band]];
            }
            let v = self.formula(&reflectance);
            if v.is_finite() {
                v
            } else {
                0.0
            }
        }))
    }
}

/// `(display name, key)` pairs in registry order.
pub fn get_index_functions() -> impl Iterator<Item = (&'static str, &'static str)> {
    SpectralIndex::ALL.into_iter().map(|idx| (idx.display_name(), idx.key()))
}

/// Display names and keys for populating a selection list.
pub fn index_choices() -> (Vec<&'static str>, Vec<&'static str>) {
    get_index_functions().unzip()
}

// ---------------------------------------------------------------------------
// Per-object statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
}

/// Mean, median and standard deviation; `None` for an empty sample.
pub fn index_stats(mut values: Vec<f32>) -> Option<IndexStats> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;

    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    } else {
        values[mid] as f64
    };

    Some(IndexStats {
        mean,
        median,
        std: var.sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::DataType;
    use image::RgbImage;
    use ndarray::Array3;
    use std::path::PathBuf;

    fn cube(wavelengths: Vec<f64>, values: Vec<f32>) -> SpectralCube {
        let bands = wavelengths.len();
        SpectralCube {
            array_data: Array3::from_shape_fn((2, 2, bands), |(_, _, b)| values[b]),
            wavelengths,
            pseudo_rgb: RgbImage::new(2, 2),
            filename: PathBuf::from("i.hdr"),
            d_type: DataType::F32,
        }
    }

    #[test]
    fn keys_resolve_and_unknown_keys_fail() {
        assert_eq!(SpectralIndex::from_key("ndvi").unwrap(), SpectralIndex::Ndvi);
        assert!(matches!(
            SpectralIndex::from_key("xyz"),
            Err(AnalysisError::UnknownIndexSelection(k)) if k == "xyz"
        ));
        let (names, keys) = index_choices();
        assert_eq!(names.len(), keys.len());
        assert_eq!(keys[0], "ndvi");
    }

    #[test]
    fn ndvi_uses_nearest_bands() {
        let c = cube(vec![550.0, 668.0, 802.0], vec![0.1, 0.2, 0.6]);
        let ndvi = SpectralIndex::Ndvi.compute(&c, WAVELENGTH_DISTANCE).unwrap();
        assert!(ndvi.iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn out_of_range_wavelengths_fail() {
        let c = cube(vec![450.0, 550.0, 650.0], vec![0.1, 0.2, 0.3]);
        assert!(matches!(
            SpectralIndex::Ndvi.compute(&c, WAVELENGTH_DISTANCE),
            Err(AnalysisError::IndexWavelengthUnavailable { index: "ndvi", .. })
        ));
    }

    #[test]
    fn division_by_zero_yields_zero() {
        let c = cube(vec![670.0, 800.0], vec![0.0, 0.0]);
        let ndvi = SpectralIndex::Ndvi.compute(&c, WAVELENGTH_DISTANCE).unwrap();
        assert!(ndvi.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn stats_match_numpy_conventions() {
        let s = index_stats(vec![4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.median, 2.5);
        assert!((s.std - 1.118_033_988_7).abs() < 1e-9);
        assert_eq!(index_stats(vec![7.0]).unwrap().std, 0.0);
        assert!(index_stats(Vec::new()).is_none());
    }
}
