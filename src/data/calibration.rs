use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::Deserialize;

use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Calibration coefficients
// ---------------------------------------------------------------------------

/// Intrinsics and Brown–Conrady distortion of one lens.
#[derive(Debug, Clone, PartialEq)]
pub struct LensCalibration {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

#[derive(Debug, Deserialize)]
struct MatrixNode {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct CalibrationFile {
    K: MatrixNode,
    D: MatrixNode,
}

/// Path of the calibration file for a lens angle.
pub fn calibration_path(folder: &Path, lens_angle: i32) -> PathBuf {
    folder.join(format!("{lens_angle}_calibration_data.yml"))
}

/// Load `K` and `D` from an OpenCV FileStorage YAML file.
pub fn load_coefficients(folder: &Path, lens_angle: i32) -> Result<LensCalibration> {
    let path = calibration_path(folder, lens_angle);
    if !path.is_file() {
        return Err(AnalysisError::MissingCalibrationData {
            angle: lens_angle,
            path,
        });
    }
    let text = std::fs::read_to_string(&path)?;
    parse_coefficients(&text).map_err(|reason| AnalysisError::InvalidCalibrationData { path, reason })
}

fn parse_coefficients(text: &str) -> std::result::Result<LensCalibration, String> {
    // OpenCV writes a `%YAML:1.0` directive and `!!opencv-matrix` tags that
    // plain YAML readers reject.
    let cleaned: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("%YAML"))
        .map(|line| line.replace("!!opencv-matrix", ""))
        .collect::<Vec<_>>()
        .join("\n");

    let file: CalibrationFile = serde_yml::from_str(&cleaned).map_err(|e| e.to_string())?;

    if file.K.rows != 3 || file.K.cols != 3 || file.K.data.len() != 9 {
        return Err("camera matrix K must be 3x3".to_string());
    }
    let d = &file.D.data;
    if d.len() < 4 || d.len() != file.D.rows * file.D.cols {
        return Err("distortion vector D needs at least k1, k2, p1, p2".to_string());
    }

    let k = &file.K.data;
    if k[0] == 0.0 || k[4] == 0.0 {
        return Err("focal length is zero".to_string());
    }
    Ok(LensCalibration {
        fx: k[0],
        fy: k[4],
        cx: k[2],
        cy: k[5],
        k1: d[0],
        k2: d[1],
        p1: d[2],
        p2: d[3],
        k3: d.get(4).copied().unwrap_or(0.0),
    })
}

// ---------------------------------------------------------------------------
// Undistortion
// ---------------------------------------------------------------------------

impl LensCalibration {
    /// Source position in the distorted image for an undistorted pixel.
    fn distort(&self, col: f64, row: f64) -> (f64, f64) {
        let x = (col - self.cx) / self.fx;
        let y = (row - self.cy) / self.fy;
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (xd * self.fx + self.cx, yd * self.fy + self.cy)
    }

    /// Source coordinates for every output pixel, `None` outside the frame.
    fn remap_table(&self, height: usize, width: usize) -> Vec<Option<(f64, f64)>> {
        let mut table = Vec::with_capacity(height * width);
        for row in 0..height {
            for col in 0..width {
                let (sx, sy) = self.distort(col as f64, row as f64);
                let (max_x, max_y) = ((width - 1) as f64, (height - 1) as f64);
                let inside = sx > -0.5 && sy > -0.5 && sx < max_x + 0.5 && sy < max_y + 0.5;
                table.push(inside.then(|| (sx.clamp(0.0, max_x), sy.clamp(0.0, max_y))));
            }
        }
        table
    }

    /// Undistort every band of a cube.
    pub fn undistort_cube(&self, data: &Array3<f32>) -> Array3<f32> {
        let (height, width, bands) = data.dim();
        let table = self.remap_table(height, width);
        let mut out = Array3::zeros((height, width, bands));
        for band in 0..bands {
            let src = data.index_axis(Axis(2), band);
            let mut dst = out.index_axis_mut(Axis(2), band);
            for (i, pos) in table.iter().enumerate() {
                if let Some((sx, sy)) = *pos {
                    dst[[i / width, i % width]] = bilinear(&src, sx, sy);
                }
            }
        }
        out
    }

    /// Undistort the pseudo-RGB preview with the same mapping.
    pub fn undistort_rgb(&self, img: &RgbImage) -> RgbImage {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let table = self.remap_table(height, width);
        let channels: Vec<Array2<f32>> = (0..3)
            .map(|c| {
                Array2::from_shape_fn((height, width), |(r, col)| {
                    img.get_pixel(col as u32, r as u32)[c] as f32
                })
            })
            .collect();

        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            match table[y as usize * width + x as usize] {
                Some((sx, sy)) => {
                    let px = |c: usize| bilinear(&channels[c].view(), sx, sy).round().clamp(0.0, 255.0) as u8;
                    Rgb([px(0), px(1), px(2)])
                }
                None => Rgb([0, 0, 0]),
            }
        })
    }
}

fn bilinear(src: &ArrayView2<'_, f32>, x: f64, y: f64) -> f32 {
    let (height, width) = src.dim();
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let top = src[[y0, x0]] * (1.0 - fx) + src[[y0, x1]] * fx;
    let bottom = src[[y1, x0]] * (1.0 - fx) + src[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}
