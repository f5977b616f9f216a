use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::draw_line_segment_mut;

use crate::data::model::LabeledObjectMap;

// ---------------------------------------------------------------------------
// Shape traits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeTraits {
    /// Pixel count.
    pub area: f64,
    /// Bounding-box width in pixels.
    pub width: f64,
    /// Bounding-box height in pixels.
    pub height: f64,
    /// Outer contour length, summed over the object's components.
    pub perimeter: f64,
    /// `(x, y)` centroid.
    pub center_of_mass: (f64, f64),
}

/// Measure one object from its pixels; `None` when it has none.
pub fn measure(pixels: &[(usize, usize)]) -> Option<ShapeTraits> {
    let (min_r, min_c, max_r, max_c) = bounds(pixels)?;
    let (sum_r, sum_c) = pixels
        .iter()
        .fold((0.0, 0.0), |(sr, sc), &(r, c)| (sr + r as f64, sc + c as f64));

    let perimeter = outer_contours(pixels).iter().map(|points| closed_length(points)).sum();

    let n = pixels.len() as f64;
    Some(ShapeTraits {
        area: n,
        width: (max_c - min_c + 1) as f64,
        height: (max_r - min_r + 1) as f64,
        perimeter,
        center_of_mass: (sum_c / n, sum_r / n),
    })
}

/// Inclusive `(min_row, min_col, max_row, max_col)`.
fn bounds(pixels: &[(usize, usize)]) -> Option<(usize, usize, usize, usize)> {
    let &(r0, c0) = pixels.first()?;
    Some(pixels.iter().fold((r0, c0, r0, c0), |(a, b, c, d), &(r, col)| {
        (a.min(r), b.min(col), c.max(r), d.max(col))
    }))
}

// ---------------------------------------------------------------------------
// Contours
// ---------------------------------------------------------------------------

/// Outer borders of every component in `pixels`, each a closed loop of
/// `(x, y)` image coordinates.
fn outer_contours(pixels: &[(usize, usize)]) -> Vec<Vec<(i32, i32)>> {
    let Some((min_r, min_c, max_r, max_c)) = bounds(pixels) else {
        return Vec::new();
    };

    // one pixel of background on every side
    let mut local = GrayImage::new((max_c - min_c + 3) as u32, (max_r - min_r + 3) as u32);
    for &(r, c) in pixels {
        local.put_pixel((c - min_c + 1) as u32, (r - min_r + 1) as u32, Luma([255]));
    }

    let (dx, dy) = (min_c as i32 - 1, min_r as i32 - 1);
    find_contours::<i32>(&local)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .map(|contour| contour.points.iter().map(|p| (p.x + dx, p.y + dy)).collect())
        .collect()
}

/// Length of the closed polyline through `points`.
fn closed_length(points: &[(i32, i32)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| f64::from(a.0 - b.0).hypot(f64::from(a.1 - b.1)))
        .sum()
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// Draw each object's outer contours into `img`, `line_width` pixels thick.
pub fn annotate(img: &mut RgbImage, labels: &LabeledObjectMap, colors: &[Rgb<u8>], line_width: u32) {
    if colors.is_empty() {
        return;
    }
    let width = line_width.max(1) as i32;
    let half = (width - 1) / 2;
    let extra = (width - 1) - half;

    for id in 1..=labels.count() {
        let color = colors[(id as usize - 1) % colors.len()];
        for points in outer_contours(&labels.pixels_of(id)) {
            for oy in -half..=extra {
                for ox in -half..=extra {
                    trace(img, &points, (ox, oy), color);
                }
            }
        }
    }
}

fn trace(img: &mut RgbImage, points: &[(i32, i32)], (ox, oy): (i32, i32), color: Rgb<u8>) {
    if let [(x, y)] = points {
        let (x, y) = (x + ox, y + oy);
        if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
            img.put_pixel(x as u32, y as u32, color);
        }
        return;
    }
    for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
        draw_line_segment_mut(
            img,
            ((a.0 + ox) as f32, (a.1 + oy) as f32),
            ((b.0 + ox) as f32, (b.1 + oy) as f32),
            color,
        );
    }
}
