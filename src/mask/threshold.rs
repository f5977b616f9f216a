use super::morphology;
use super::MaskStrategy;
use crate::data::model::{Mask, SpectralCube};
use crate::error::Result;
use crate::settings::MaskOptions;
use crate::warnings::{Warning, Warnings};

/// Kernel passes applied when `dilate_pixel` is set.
const DILATE_ITERATIONS: usize = 2;

// ---------------------------------------------------------------------------
// Default mask: single-band threshold + cleanup
// ---------------------------------------------------------------------------

/// Threshold one band, drop small specks, optionally grow the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdMask;

impl ThresholdMask {
    /// Band index for the configured wavelength; band 0 when unset or
    /// not present in the cube.
    pub fn select_band(cube: &SpectralCube, options: &MaskOptions, warnings: &mut Warnings) -> usize {
        match options.wavelength {
            None => {
                warnings.push(Warning::NoWavelengthSelected);
                0
            }
            Some(nm) => cube.band_for_wavelength(nm).unwrap_or_else(|| {
                warnings.push(Warning::WavelengthNotFound(nm));
                0
            }),
        }
    }
}

impl MaskStrategy for ThresholdMask {
    fn name(&self) -> &str {
        "default"
    }

    fn build(
        &self,
        cube: SpectralCube,
        options: &MaskOptions,
        warnings: &mut Warnings,
    ) -> Result<(SpectralCube, Mask)> {
        let band = Self::select_band(&cube, options, warnings);
        log::debug!(
            "Thresholding band {band} at {} (fill {}, dilate {})",
            options.threshold,
            options.fill_size,
            options.dilate
        );

        let mut mask = morphology::threshold(cube.band(band), options.threshold);
        mask = morphology::fill(&mask, options.fill_size);
        if options.dilate {
            mask = morphology::dilate(&mask, DILATE_ITERATIONS);
        }

        log::info!("Mask created: {} foreground pixels", mask.count());
        Ok((cube, mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::DataType;
    use image::RgbImage;
    use ndarray::Array3;
    use std::path::PathBuf;

    fn cube() -> SpectralCube {
        // band 0 bright on the left half, band 1 bright on the right half
        let array_data = Array3::from_shape_fn((6, 6, 2), |(_, c, b)| match (b, c < 3) {
            (0, true) | (1, false) => 0.9,
            _ => 0.1,
        });
        SpectralCube {
            array_data,
            wavelengths: vec![670.0, 800.0],
            pseudo_rgb: RgbImage::new(6, 6),
            filename: PathBuf::from("t.hdr"),
            d_type: DataType::F32,
        }
    }

    fn options(wavelength: Option<u32>) -> MaskOptions {
        MaskOptions {
            wavelength,
            threshold: 0.5,
            fill_size: 0,
            dilate: false,
        }
    }

    #[test]
    fn unset_wavelength_uses_first_band_with_one_warning() {
        let mut warnings = Warnings::new();
        let (_, mask) = ThresholdMask.build(cube(), &options(None), &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings.iter().next(), Some(&Warning::NoWavelengthSelected));
        assert!(mask.get(0, 0) && !mask.get(0, 5));
    }

    #[test]
    fn selected_wavelength_picks_its_band() {
        let mut warnings = Warnings::new();
        let (_, mask) = ThresholdMask.build(cube(), &options(Some(800)), &mut warnings).unwrap();
        assert!(warnings.is_empty());
        assert!(!mask.get(0, 0) && mask.get(0, 5));
        assert_eq!(mask.count(), 18);
    }

    #[test]
    fn unknown_wavelength_falls_back_to_first_band() {
        let mut warnings = Warnings::new();
        let (_, mask) = ThresholdMask.build(cube(), &options(Some(550)), &mut warnings).unwrap();
        assert_eq!(warnings.into_vec(), vec![Warning::WavelengthNotFound(550)]);
        assert!(mask.get(0, 0));
    }

    #[test]
    fn dilation_is_fixed_at_two_passes() {
        let mut opts = options(None);
        opts.dilate = true;
        let (_, mask) = ThresholdMask.build(cube(), &opts, &mut Warnings::new()).unwrap();
        // columns 0..3 grow by two columns to the right
        assert_eq!(mask.count(), 30);
    }
}
