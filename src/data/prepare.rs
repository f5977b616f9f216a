use ndarray::{Array3, Axis};

use super::calibration;
use super::loader;
use super::model::{DataType, SpectralCube};
use crate::error::Result;
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Cube preparation
// ---------------------------------------------------------------------------

/// Load the input cube and bring it into the range the masks expect.
///
/// * 8-bit cubes are rescaled to 0–1; deeper cubes keep their values.
/// * `normalize` stretches every band to 0–1 against its own dark (min)
///   and reference (max) level.
/// * A non-zero `lensAngle` undistorts cube and preview with the matching
///   calibration file, which must exist.
pub fn prepare_spectral_data(settings: &Settings) -> Result<SpectralCube> {
    let mut cube = loader::load_file(&settings.input_image)?;
    let options = settings.image_options();

    rescale_8bit(&mut cube);

    if options.normalize {
        cube.array_data = dark_normalize(&cube.array_data);
    }

    if options.lens_angle != 0 {
        let cal = calibration::load_coefficients(&settings.calibration_folder, options.lens_angle)?;
        log::info!("Undistorting with {}° lens calibration", options.lens_angle);
        cube.array_data = cal.undistort_cube(&cube.array_data);
        cube.pseudo_rgb = cal.undistort_rgb(&cube.pseudo_rgb);
    }

    Ok(cube)
}

fn rescale_8bit(cube: &mut SpectralCube) {
    if cube.d_type == DataType::U8 {
        cube.array_data.mapv_inplace(|v| v / 255.0);
    }
}

/// Per-band `(v - min) / (max - min)`; constant bands become 0.
pub fn dark_normalize(data: &Array3<f32>) -> Array3<f32> {
    let mut out = data.clone();
    for mut band in out.axis_iter_mut(Axis(2)) {
        let (min, max) = band
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let span = max - min;
        if span > 0.0 && span.is_finite() {
            band.mapv_inplace(|v| (v - min) / span);
        } else {
            band.fill(0.0);
        }
    }
    out
}
