use image::{Rgb, RgbImage};

use crate::settings::RoiItem;
use crate::warnings::{Warning, Warnings};

// ---------------------------------------------------------------------------
// RoiSpec – one validated ROI geometry
// ---------------------------------------------------------------------------

/// A region of interest in image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum RoiSpec {
    Circle { center: (f64, f64), radius: i64 },
    /// `x0`/`y0` is the top-left corner; covers `width × height` pixels.
    Rectangle { x0: i64, y0: i64, width: i64, height: i64 },
}

impl RoiSpec {
    /// Interpret a UI entry.  Coordinates are the ROI centre for both
    /// shapes; the circle radius is half the entered width.
    fn from_item(item: &RoiItem, label: &str) -> Result<RoiSpec, Warning> {
        let spec = match item.shape.as_str() {
            "Circle" => RoiSpec::Circle {
                center: (item.x, item.y),
                radius: (item.width / 2.0) as i64,
            },
            "Rectangle" => RoiSpec::Rectangle {
                x0: (item.x - item.width / 2.0).floor() as i64,
                y0: (item.y - item.height / 2.0).floor() as i64,
                width: item.width as i64,
                height: item.height as i64,
            },
            other => return Err(Warning::UnsupportedRoiShape(other.to_string())),
        };

        let positive = match spec {
            RoiSpec::Circle { radius, .. } => radius > 0,
            RoiSpec::Rectangle { width, height, .. } => width > 0 && height > 0,
        };
        if !positive {
            return Err(Warning::InvalidRoiSize {
                label: label.to_string(),
            });
        }
        Ok(spec)
    }

    /// Inclusive `(min_x, min_y, max_x, max_y)` bounding box.
    fn bounds(&self) -> (i64, i64, i64, i64) {
        match *self {
            RoiSpec::Circle { center, radius } => {
                let (cx, cy) = center;
                (
                    (cx - radius as f64).floor() as i64,
                    (cy - radius as f64).floor() as i64,
                    (cx + radius as f64).ceil() as i64,
                    (cy + radius as f64).ceil() as i64,
                )
            }
            RoiSpec::Rectangle { x0, y0, width, height } => (x0, y0, x0 + width - 1, y0 + height - 1),
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        match *self {
            RoiSpec::Circle { center, radius } => {
                let dx = x as f64 - center.0;
                let dy = y as f64 - center.1;
                dx * dx + dy * dy <= (radius * radius) as f64
            }
            RoiSpec::Rectangle { x0, y0, width, height } => {
                x >= x0 && x < x0 + width && y >= y0 && y < y0 + height
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RoiCollection – compiled ROIs bound to an image frame
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRoi {
    pub label: String,
    pub spec: RoiSpec,
    /// Image-clipped inclusive pixel bounds `(min_col, min_row, max_col, max_row)`;
    /// `None` when the ROI lies completely outside the frame.
    clip: Option<(usize, usize, usize, usize)>,
}

impl CompiledRoi {
    /// `(row, col)` of every in-frame pixel covered by the ROI.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (min_c, min_r, max_c, max_r) = self.clip.unwrap_or((1, 1, 0, 0));
        (min_r..=max_r)
            .flat_map(move |r| (min_c..=max_c).map(move |c| (r, c)))
            .filter(move |&(r, c)| self.spec.contains(c as i64, r as i64))
    }

    /// In-frame pixels of the ROI with a 4-neighbour outside it.
    pub fn outline(&self) -> Vec<(usize, usize)> {
        self.pixels()
            .filter(|&(r, c)| {
                let (x, y) = (c as i64, r as i64);
                [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                    .iter()
                    .any(|&(nx, ny)| !self.spec.contains(nx, ny))
            })
            .collect()
    }
}

/// ROI outline colour on annotated previews.
pub const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Ordered ROIs; order decides object ids downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoiCollection {
    rois: Vec<CompiledRoi>,
}

impl RoiCollection {
    pub fn len(&self) -> usize {
        self.rois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRoi> {
        self.rois.iter()
    }

    /// Paint every ROI outline into `img` in [`OUTLINE_COLOR`].
    pub fn draw_outlines(&self, img: &mut RgbImage) {
        for (r, c) in self.rois.iter().flat_map(CompiledRoi::outline) {
            if (c as u32) < img.width() && (r as u32) < img.height() {
                img.put_pixel(c as u32, r as u32, OUTLINE_COLOR);
            }
        }
    }
}

/// Compile UI ROI entries against the reference image's frame.
///
/// An entry with an unsupported shape or a non-positive size ends
/// compilation; the ROIs before it are kept.
pub fn process_rois(items: &[RoiItem], reference: &RgbImage, warnings: &mut Warnings) -> RoiCollection {
    let (width, height) = (reference.width() as i64, reference.height() as i64);
    let mut rois = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let label = format!("{} {}", item.shape, i + 1);
        log::debug!(
            "RoiItem: {} {} {} {} {}",
            item.shape,
            item.x,
            item.y,
            item.width,
            item.height
        );

        let spec = match RoiSpec::from_item(item, &label) {
            Ok(spec) => spec,
            Err(warning) => {
                warnings.push(warning);
                break;
            }
        };

        let (min_x, min_y, max_x, max_y) = spec.bounds();
        if min_x < 0 || min_y < 0 || max_x >= width || max_y >= height {
            warnings.push(Warning::RoiClipped { label: label.clone() });
        }
        let clip = (min_x < width && min_y < height && max_x >= 0 && max_y >= 0).then(|| {
            (
                min_x.max(0) as usize,
                min_y.max(0) as usize,
                max_x.min(width - 1) as usize,
                max_y.min(height - 1) as usize,
            )
        });

        rois.push(CompiledRoi { label, spec, clip });
    }

    log::info!("Compiled {} of {} rois", rois.len(), items.len());
    RoiCollection { rois }
}
