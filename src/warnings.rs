use std::fmt;

// ---------------------------------------------------------------------------
// Recoverable conditions – logged and recorded, never returned as Err
// ---------------------------------------------------------------------------

/// A non-fatal advisory raised while a run degrades gracefully.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Mask wavelength unset; band 0 used instead.
    NoWavelengthSelected,
    /// Mask wavelength not in the cube's wavelength mapping; band 0 used.
    WavelengthNotFound(u32),
    /// ROI list truncated at an entry with an unknown shape tag.
    UnsupportedRoiShape(String),
    /// ROI list truncated at an entry with a non-positive size.
    InvalidRoiSize { label: String },
    /// ROI partly or fully outside the reference image.
    RoiClipped { label: String },
    /// Labeled object without a recorded measurement; dropped from results.
    MissingMeasurementForObject(u32),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NoWavelengthSelected => {
                write!(f, "no wavelength selected, defaulting to first band")
            }
            Warning::WavelengthNotFound(wl) => {
                write!(f, "wavelength {wl} nm not in cube, defaulting to first band")
            }
            Warning::UnsupportedRoiShape(tag) => {
                write!(f, "roi type '{tag}' is neither circle or rectangle, ignoring remaining rois")
            }
            Warning::InvalidRoiSize { label } => {
                write!(f, "{label} has a non-positive size, ignoring remaining rois")
            }
            Warning::RoiClipped { label } => write!(f, "{label} extends outside the image and was clipped"),
            Warning::MissingMeasurementForObject(id) => {
                write!(f, "no measurement recorded for plant_{id}, skipping")
            }
        }
    }
}

/// Per-run collector of [`Warning`]s.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and forward it to the `log` facade.
    pub fn push(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.items.push(warning);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}
