use std::collections::HashMap;

use image::{GrayImage, Luma};
use ndarray::{Array2, ArrayView2};

use imageproc::region_labelling;

pub use imageproc::region_labelling::Connectivity;

use crate::data::model::Mask;

// ---------------------------------------------------------------------------
// Connected components
// ---------------------------------------------------------------------------

/// 255 where `data` is set, 0 elsewhere.
pub fn binary_image(data: &Array2<bool>) -> GrayImage {
    let (height, width) = data.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([if data[[y as usize, x as usize]] { 255 } else { 0 }])
    })
}

/// Foreground components of a binary image, in raster-scan order of their
/// first pixel.
#[derive(Debug, Clone)]
pub struct Components {
    /// Component index + 1 per pixel, 0 for background.
    pub grid: Array2<u32>,
    /// `(row, col)` pixels of each component.
    pub pixels: Vec<Vec<(usize, usize)>>,
}

impl Components {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

pub fn connected_components(image: &Array2<bool>, connectivity: Connectivity) -> Components {
    let (height, width) = image.dim();
    let mut grid = Array2::<u32>::zeros((height, width));
    let mut pixels: Vec<Vec<(usize, usize)>> = Vec::new();
    if height == 0 || width == 0 {
        return Components { grid, pixels };
    }

    let binary = binary_image(image);
    let labelled = region_labelling::connected_components(&binary, connectivity, Luma([0u8]));

    // renumber so indices follow the raster order of each region's first pixel
    let mut index_of: HashMap<u32, usize> = HashMap::new();
    for (x, y, label) in labelled.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let idx = *index_of.entry(label).or_insert_with(|| {
            pixels.push(Vec::new());
            pixels.len() - 1
        });
        let (r, c) = (y as usize, x as usize);
        grid[[r, c]] = idx as u32 + 1;
        pixels[idx].push((r, c));
    }

    Components { grid, pixels }
}

// ---------------------------------------------------------------------------
// Mask primitives
// ---------------------------------------------------------------------------

/// Binarize a band: `value >= threshold` is foreground.
pub fn threshold(band: ArrayView2<'_, f32>, threshold: f32) -> Mask {
    Mask::new(band.mapv(|v| v >= threshold))
}

/// Remove 4-connected foreground regions smaller than `size` pixels.
pub fn fill(mask: &Mask, size: usize) -> Mask {
    if size == 0 {
        return mask.clone();
    }
    let components = connected_components(mask.data(), Connectivity::Four);
    let mut data = mask.data().clone();
    for region in components.pixels.iter().filter(|p| p.len() < size) {
        for &(r, c) in region {
            data[[r, c]] = false;
        }
    }
    Mask::new(data)
}

/// Dilate with a 2×2 kernel anchored at its lower-right cell, repeated
/// `iterations` times.
pub fn dilate(mask: &Mask, iterations: usize) -> Mask {
    let mut current = mask.data().clone();
    let (height, width) = current.dim();
    for _ in 0..iterations {
        current = Array2::from_shape_fn((height, width), |(r, c)| {
            current[[r, c]]
                || (c > 0 && current[[r, c - 1]])
                || (r > 0 && current[[r - 1, c]])
                || (r > 0 && c > 0 && current[[r - 1, c - 1]])
        });
    }
    Mask::new(current)
}
