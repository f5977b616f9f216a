use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Settings bundle
// ---------------------------------------------------------------------------

/// Everything one analysis run reads, in the host application's layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub input_image: PathBuf,
    pub output_folder: PathBuf,
    /// Mask preview destination, only written by preview invocations.
    #[serde(default)]
    pub output_image: Option<PathBuf>,
    /// Registered mask strategy to use instead of the built-in one.
    #[serde(default)]
    pub mask_strategy: Option<String>,
    #[serde(default = "default_calibration_folder")]
    pub calibration_folder: PathBuf,
    pub experiment_settings: ExperimentSettings,
}

fn default_calibration_folder() -> PathBuf {
    PathBuf::from("calibration_data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSettings {
    pub roi_info: RoiInfo,
    pub analysis: AnalysisSettings,
    pub image_options: ImageOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiInfo {
    #[serde(default)]
    pub roi_items: Vec<RoiItem>,
}

/// One ROI as entered in the UI: `(shape, x, y, width, height)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, f64, f64, f64, f64)", into = "(String, f64, f64, f64, f64)")]
pub struct RoiItem {
    pub shape: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RoiItem {
    pub fn new(shape: &str, x: f64, y: f64, width: f64, height: f64) -> Self {
        RoiItem {
            shape: shape.to_string(),
            x,
            y,
            width,
            height,
        }
    }
}

impl From<(String, f64, f64, f64, f64)> for RoiItem {
    fn from((shape, x, y, width, height): (String, f64, f64, f64, f64)) -> Self {
        RoiItem {
            shape,
            x,
            y,
            width,
            height,
        }
    }
}

impl From<RoiItem> for (String, f64, f64, f64, f64) {
    fn from(item: RoiItem) -> Self {
        (item.shape, item.x, item.y, item.width, item.height)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSettings {
    pub mask_options: MaskOptions,
    pub script_options: ScriptOptions,
    pub chart_options: ChartOptions,
}

/// Options of the thresholding mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskOptions {
    /// Band to threshold, in nm. `None` means "first band".
    #[serde(default, deserialize_with = "deserialize_wavelength")]
    pub wavelength: Option<u32>,
    #[serde(rename = "wl_thresh")]
    pub threshold: f32,
    #[serde(default)]
    pub fill_size: usize,
    #[serde(rename = "dilate_pixel", default)]
    pub dilate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOptions {
    pub general: GeneralOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralOptions {
    #[serde(default)]
    pub analyze_index: bool,
    #[serde(default)]
    pub index_selection: String,
    #[serde(default)]
    pub analyze_shape: bool,
    #[serde(default = "default_line_width")]
    pub line_width: u32,
}

fn default_line_width() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOptions {
    pub plot_selection: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    #[serde(default)]
    pub lens_angle: i32,
    #[serde(default)]
    pub normalize: bool,
}

/// Accepts `550`, `"550"`, `""`, `"None"` or `null`.
fn deserialize_wavelength<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n.round() as u32)),
        Some(Raw::Text(s)) => {
            let s = s.trim();
            if s.is_empty() || s == "None" {
                Ok(None)
            } else {
                s.parse::<f64>()
                    .map(|n| Some(n.round() as u32))
                    .map_err(|_| serde::de::Error::custom(format!("invalid wavelength '{s}'")))
            }
        }
    }
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn mask_options(&self) -> &MaskOptions {
        &self.experiment_settings.analysis.mask_options
    }

    pub fn general(&self) -> &GeneralOptions {
        &self.experiment_settings.analysis.script_options.general
    }

    pub fn plot_selection(&self) -> &str {
        &self.experiment_settings.analysis.chart_options.plot_selection
    }

    pub fn image_options(&self) -> &ImageOptions {
        &self.experiment_settings.image_options
    }

    pub fn roi_items(&self) -> &[RoiItem] {
        &self.experiment_settings.roi_info.roi_items
    }
}
