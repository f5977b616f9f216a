use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::{Array2, Array3, ArrayView2, Axis};

// ---------------------------------------------------------------------------
// DataType – on-disk sample type of a cube
// ---------------------------------------------------------------------------

/// Sample type of the raw cube, using the ENVI `data type` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    I16,
    I32,
    F32,
    F64,
    U16,
    U32,
    I64,
    U64,
}

impl DataType {
    pub fn from_envi_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => DataType::U8,
            2 => DataType::I16,
            3 => DataType::I32,
            4 => DataType::F32,
            5 => DataType::F64,
            12 => DataType::U16,
            13 => DataType::U32,
            14 => DataType::I64,
            15 => DataType::U64,
            _ => return None,
        })
    }

    pub fn envi_code(self) -> u32 {
        match self {
            DataType::U8 => 1,
            DataType::I16 => 2,
            DataType::I32 => 3,
            DataType::F32 => 4,
            DataType::F64 => 5,
            DataType::U16 => 12,
            DataType::U32 => 13,
            DataType::I64 => 14,
            DataType::U64 => 15,
        }
    }

    /// Bytes per sample.
    pub fn size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::U8 => "uint8",
            DataType::I16 => "int16",
            DataType::I32 => "int32",
            DataType::F32 => "float32",
            DataType::F64 => "float64",
            DataType::U16 => "uint16",
            DataType::U32 => "uint32",
            DataType::I64 => "int64",
            DataType::U64 => "uint64",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// SpectralCube – one loaded image
// ---------------------------------------------------------------------------

/// A hyperspectral image held in memory.
#[derive(Debug, Clone)]
pub struct SpectralCube {
    /// Samples laid out as `[row, col, band]`.
    pub array_data: Array3<f32>,
    /// Band index → wavelength in nm. Empty when the header has none.
    pub wavelengths: Vec<f64>,
    /// 8-bit pseudo-colour preview, same width/height as the cube.
    pub pseudo_rgb: RgbImage,
    /// Header path the cube was loaded from.
    pub filename: PathBuf,
    /// On-disk sample type before conversion to `f32`.
    pub d_type: DataType,
}

impl SpectralCube {
    pub fn height(&self) -> usize {
        self.array_data.dim().0
    }

    pub fn width(&self) -> usize {
        self.array_data.dim().1
    }

    pub fn bands(&self) -> usize {
        self.array_data.dim().2
    }

    /// View of a single band.
    pub fn band(&self, index: usize) -> ArrayView2<'_, f32> {
        self.array_data.index_axis(Axis(2), index)
    }

    /// Band whose wavelength rounds to exactly `nm`.
    pub fn band_for_wavelength(&self, nm: u32) -> Option<usize> {
        self.wavelengths
            .iter()
            .position(|wl| wl.round() as i64 == nm as i64)
    }

    /// Band with the wavelength closest to `nm`.
    pub fn nearest_band(&self, nm: f64) -> Option<usize> {
        self.wavelengths
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - nm).abs().total_cmp(&(b.1 - nm).abs()))
            .map(|(i, _)| i)
    }

    /// Smallest and largest wavelength, if the cube carries any.
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        let min = self.wavelengths.iter().copied().reduce(f64::min)?;
        let max = self.wavelengths.iter().copied().reduce(f64::max)?;
        Some((min, max))
    }

    /// File stem of the source, used to name output artifacts.
    pub fn image_name(&self) -> String {
        image_name(&self.filename)
    }
}

pub(crate) fn image_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

// ---------------------------------------------------------------------------
// Mask – binary plant/background image
// ---------------------------------------------------------------------------

/// Binary foreground mask indexed `[row, col]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    data: Array2<bool>,
}

impl Mask {
    pub fn new(data: Array2<bool>) -> Self {
        Mask { data }
    }

    pub fn from_fn(height: usize, width: usize, f: impl FnMut((usize, usize)) -> bool) -> Self {
        Mask::new(Array2::from_shape_fn((height, width), f))
    }

    pub fn empty(height: usize, width: usize) -> Self {
        Mask::new(Array2::from_elem((height, width), false))
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.data[[row, col]]
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn data(&self) -> &Array2<bool> {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// LabeledObjectMap – pixel → object id
// ---------------------------------------------------------------------------

/// Object ids per pixel; 0 is background, objects are `1..=count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledObjectMap {
    labels: Array2<u32>,
    count: u32,
}

impl LabeledObjectMap {
    pub(crate) fn new(labels: Array2<u32>, count: u32) -> Self {
        LabeledObjectMap { labels, count }
    }

    pub fn background(height: usize, width: usize) -> Self {
        LabeledObjectMap::new(Array2::zeros((height, width)), 0)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn height(&self) -> usize {
        self.labels.nrows()
    }

    pub fn width(&self) -> usize {
        self.labels.ncols()
    }

    pub fn id_at(&self, row: usize, col: usize) -> u32 {
        self.labels[[row, col]]
    }

    pub fn labels(&self) -> &Array2<u32> {
        &self.labels
    }

    /// `(row, col)` of every pixel belonging to `id`.
    pub fn pixels_of(&self, id: u32) -> Vec<(usize, usize)> {
        self.labels
            .indexed_iter()
            .filter(|(_, &v)| v == id)
            .map(|(rc, _)| rc)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_with_wavelengths(wavelengths: Vec<f64>) -> SpectralCube {
        let bands = wavelengths.len();
        SpectralCube {
            array_data: Array3::zeros((2, 3, bands)),
            wavelengths,
            pseudo_rgb: RgbImage::new(3, 2),
            filename: PathBuf::from("/data/run1/plants.hdr"),
            d_type: DataType::F32,
        }
    }

    #[test]
    fn wavelength_lookup_is_exact_after_rounding() {
        let cube = cube_with_wavelengths(vec![450.2, 550.0, 649.6]);
        assert_eq!(cube.band_for_wavelength(550), Some(1));
        assert_eq!(cube.band_for_wavelength(650), Some(2));
        assert_eq!(cube.band_for_wavelength(500), None);
    }

    #[test]
    fn nearest_band_and_range() {
        let cube = cube_with_wavelengths(vec![450.0, 550.0, 650.0]);
        assert_eq!(cube.nearest_band(530.0), Some(1));
        assert_eq!(cube.wavelength_range(), Some((450.0, 650.0)));
        assert_eq!(cube.image_name(), "plants");
        assert_eq!((cube.height(), cube.width(), cube.bands()), (2, 3, 3));
    }

    #[test]
    fn envi_codes_round_trip_through_enum() {
        for code in [1, 2, 3, 4, 5, 12, 13, 14, 15] {
            let dt = DataType::from_envi_code(code).unwrap();
            assert_eq!(dt.envi_code(), code);
        }
        assert_eq!(DataType::from_envi_code(6), None);
    }
}
