use std::path::{Path, PathBuf};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::analysis::{AnalysisModes, IndexStats, Observations, ShapeTraits, SpectralIndex};
use crate::error::{AnalysisError, Result};
use crate::settings::Settings;
use crate::warnings::{Warning, Warnings};

/// `plot_selection` value meaning "plot the selected index's mean".
pub const PLOT_INDEX: &str = "plot_index";

// ---------------------------------------------------------------------------
// Plot selection
// ---------------------------------------------------------------------------

/// The record field a chart plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotField {
    IndexMean,
    Area,
    Width,
    Height,
    Perimeter,
    Mean,
    Median,
    Std,
}

impl PlotField {
    pub fn from_selection(selection: &str) -> Option<Self> {
        Some(match selection {
            PLOT_INDEX => PlotField::IndexMean,
            "area" => PlotField::Area,
            "width" => PlotField::Width,
            "height" => PlotField::Height,
            "perimeter" => PlotField::Perimeter,
            "mean" => PlotField::Mean,
            "median" => PlotField::Median,
            "std" => PlotField::Std,
            _ => return None,
        })
    }

    pub fn is_shape(self) -> bool {
        matches!(
            self,
            PlotField::Area | PlotField::Width | PlotField::Height | PlotField::Perimeter
        )
    }

    fn value(self, traits: &ObjectTraits) -> Option<f64> {
        if self.is_shape() {
            let shape = traits.shape()?;
            Some(match self {
                PlotField::Area => shape.area,
                PlotField::Width => shape.width,
                PlotField::Height => shape.height,
                _ => shape.perimeter,
            })
        } else {
            let stats = traits.index_stats()?;
            Some(match self {
                PlotField::Median => stats.median,
                PlotField::Std => stats.std,
                _ => stats.mean,
            })
        }
    }
}

/// Resolve `selection` against the active modes.
///
/// `Ok(None)` when neither mode runs; otherwise the selection must name a
/// field the active modes will populate.
pub fn resolve_plot_field(selection: &str, modes: &AnalysisModes) -> Result<Option<PlotField>> {
    if !modes.analyze_index && !modes.analyze_shape {
        return Ok(None);
    }
    let invalid = || AnalysisError::InvalidPlotSelection(selection.to_string());
    let field = PlotField::from_selection(selection).ok_or_else(invalid)?;
    let populated = if field.is_shape() {
        modes.analyze_shape
    } else {
        modes.analyze_index
    };
    if populated {
        Ok(Some(field))
    } else {
        Err(invalid())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Traits of one object, shaped by which analyses ran.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectTraits {
    Shape(ShapeTraits),
    Index {
        name: String,
        stats: IndexStats,
    },
    Both {
        shape: ShapeTraits,
        name: String,
        stats: IndexStats,
    },
    None,
}

impl ObjectTraits {
    pub fn shape(&self) -> Option<&ShapeTraits> {
        match self {
            ObjectTraits::Shape(shape) | ObjectTraits::Both { shape, .. } => Some(shape),
            _ => None,
        }
    }

    pub fn index_name(&self) -> Option<&str> {
        match self {
            ObjectTraits::Index { name, .. } | ObjectTraits::Both { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn index_stats(&self) -> Option<&IndexStats> {
        match self {
            ObjectTraits::Index { stats, .. } | ObjectTraits::Both { stats, .. } => Some(stats),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitRecord {
    /// Object id, `1..=n`.
    pub roi: u32,
    pub traits: ObjectTraits,
    pub plot_value: Option<f64>,
}

/// Nullable-field layout consumers read.
#[derive(serde::Serialize)]
struct FlatRecord<'a> {
    roi: u32,
    area: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    perimeter: Option<f64>,
    index: Option<&'a str>,
    mean: Option<f64>,
    median: Option<f64>,
    std: Option<f64>,
    plot_value: Option<f64>,
}

impl TraitRecord {
    fn flat(&self) -> FlatRecord<'_> {
        let shape = self.traits.shape();
        let stats = self.traits.index_stats();
        FlatRecord {
            roi: self.roi,
            area: shape.map(|s| s.area),
            width: shape.map(|s| s.width),
            height: shape.map(|s| s.height),
            perimeter: shape.map(|s| s.perimeter),
            index: self.traits.index_name(),
            mean: stats.map(|s| s.mean),
            median: stats.map(|s| s.median),
            std: stats.map(|s| s.std),
            plot_value: self.plot_value,
        }
    }
}

impl Serialize for TraitRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.flat().serialize(serializer)
    }
}

/// Records of one run plus the processed preview they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub image_file_name: PathBuf,
    pub records: Vec<TraitRecord>,
}

#[derive(serde::Serialize)]
struct Rois<'a> {
    rois: &'a [TraitRecord],
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("imageFileName", &self.image_file_name)?;
        map.serialize_entry("dict", &Rois { rois: &self.records })?;
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Build one record per object id `1..=n`.
///
/// With at least one mode active, an id whose required measurements are
/// missing is skipped with a [`Warning::MissingMeasurementForObject`].
/// With no mode active every id gets a record with all metrics null.
pub fn assemble(
    observations: &Observations,
    n: u32,
    modes: &AnalysisModes,
    plot: Option<PlotField>,
    image_file_name: PathBuf,
    warnings: &mut Warnings,
) -> ResultSet {
    let mut records = Vec::with_capacity(n as usize);

    for id in 1..=n {
        let traits = match (modes.analyze_shape, modes.analyze_index) {
            (false, false) => Some(ObjectTraits::None),
            (shape_mode, index_mode) => observations.get(id).and_then(|obs| {
                match (shape_mode, index_mode) {
                    (true, false) => obs.shape.map(ObjectTraits::Shape),
                    (false, _) => obs.index.map(|stats| ObjectTraits::Index {
                        name: modes.selected_index.clone(),
                        stats,
                    }),
                    (true, true) => Some(ObjectTraits::Both {
                        shape: obs.shape?,
                        name: modes.selected_index.clone(),
                        stats: obs.index?,
                    }),
                }
            }),
        };

        let Some(traits) = traits else {
            warnings.push(Warning::MissingMeasurementForObject(id));
            continue;
        };
        let plot_value = plot.and_then(|field| field.value(&traits));
        records.push(TraitRecord {
            roi: id,
            traits,
            plot_value,
        });
    }

    ResultSet {
        image_file_name,
        records,
    }
}

/// Axis labels `(title, y-axis)` for the chart of a run's plot value.
pub fn chart_labels(settings: &Settings) -> Result<(String, String)> {
    let general = settings.general();
    let selection = settings.plot_selection();
    let shape_plot = PlotField::from_selection(selection).is_some_and(PlotField::is_shape);
    let leaf = || (format!("Leaf {selection}"), format!("Leaf {selection} [px]"));

    if shape_plot && general.analyze_shape {
        Ok(leaf())
    } else if general.analyze_index {
        let index = SpectralIndex::from_key(&general.index_selection)?;
        Ok((index.display_name().to_string(), "relative index value".to_string()))
    } else if general.analyze_shape {
        Ok(leaf())
    } else {
        Ok((String::new(), String::new()))
    }
}

/// Write one CSV row per record, nulls as empty cells.
pub fn write_csv(results: &ResultSet, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in &results.records {
        writer.serialize(record.flat())?;
    }
    writer.flush()?;
    log::info!("Wrote {} records to {}", results.records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ObjectObservations;

    fn modes(analyze_index: bool, analyze_shape: bool) -> AnalysisModes {
        AnalysisModes {
            analyze_index,
            selected_index: "ndvi".to_string(),
            analyze_shape,
        }
    }

    fn shape(area: f64) -> ShapeTraits {
        ShapeTraits {
            area,
            width: 4.0,
            height: 5.0,
            perimeter: 14.0,
            center_of_mass: (1.0, 2.0),
        }
    }

    fn stats(mean: f64) -> IndexStats {
        IndexStats {
            mean,
            median: mean,
            std: 0.1,
        }
    }

    fn observations() -> Observations {
        let mut obs = Observations::new();
        *obs.entry(1) = ObjectObservations {
            shape: Some(shape(20.0)),
            index: Some(stats(0.4)),
        };
        *obs.entry(3) = ObjectObservations {
            shape: Some(shape(9.0)),
            index: None,
        };
        obs
    }

    #[test]
    fn plot_selection_must_match_active_modes() {
        assert_eq!(resolve_plot_field("area", &modes(false, true)).unwrap(), Some(PlotField::Area));
        assert_eq!(
            resolve_plot_field(PLOT_INDEX, &modes(true, false)).unwrap(),
            Some(PlotField::IndexMean)
        );
        assert_eq!(resolve_plot_field("anything", &modes(false, false)).unwrap(), None);
        for (sel, m) in [("area", modes(true, false)), (PLOT_INDEX, modes(false, true)), ("leaves", modes(true, true))] {
            assert!(matches!(
                resolve_plot_field(sel, &m),
                Err(AnalysisError::InvalidPlotSelection(s)) if s == sel
            ));
        }
    }

    #[test]
    fn shape_only_records() {
        let mut warnings = Warnings::new();
        let set = assemble(&observations(), 3, &modes(false, true), Some(PlotField::Area), "a.png".into(), &mut warnings);
        assert_eq!(set.records.len(), 2);
        assert_eq!(set.records[0].roi, 1);
        assert_eq!(set.records[0].traits, ObjectTraits::Shape(shape(20.0)));
        assert_eq!(set.records[1].plot_value, Some(9.0));
        assert_eq!(warnings.into_vec(), vec![Warning::MissingMeasurementForObject(2)]);
    }

    #[test]
    fn index_only_and_both_modes() {
        let mut warnings = Warnings::new();
        let set = assemble(&observations(), 3, &modes(true, false), Some(PlotField::IndexMean), "a.png".into(), &mut warnings);
        assert_eq!(set.records.len(), 1);
        assert_eq!(set.records[0].traits.index_name(), Some("ndvi"));
        assert!(set.records[0].traits.shape().is_none());
        assert_eq!(set.records[0].plot_value, Some(0.4));

        let set = assemble(&observations(), 3, &modes(true, true), Some(PlotField::Perimeter), "a.png".into(), &mut warnings);
        assert_eq!(set.records.len(), 1);
        assert!(matches!(set.records[0].traits, ObjectTraits::Both { .. }));
        assert_eq!(set.records[0].plot_value, Some(14.0));
    }

    #[test]
    fn neither_mode_keeps_ids_with_null_metrics() {
        let mut warnings = Warnings::new();
        let set = assemble(&Observations::new(), 2, &modes(false, false), None, "a.png".into(), &mut warnings);
        assert!(warnings.is_empty());
        assert_eq!(set.records.len(), 2);
        let json = serde_json::to_value(&set.records[1]).unwrap();
        assert_eq!(json["roi"], 2);
        for key in ["area", "width", "height", "perimeter", "index", "mean", "median", "std", "plot_value"] {
            assert!(json[key].is_null(), "{key}");
        }
    }

    #[test]
    fn result_set_uses_consumer_layout() {
        let mut warnings = Warnings::new();
        let set = assemble(&observations(), 1, &modes(false, true), Some(PlotField::Area), "out/a.png".into(), &mut warnings);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["imageFileName"], "out/a.png");
        assert_eq!(json["dict"]["rois"][0]["area"], 20.0);
        assert!(json["dict"]["rois"][0]["mean"].is_null());
    }

    #[test]
    fn csv_has_a_row_per_record() {
        let dir = std::env::temp_dir().join(format!("rusty_canopy_csv_{}", std::process::id()));
        let path = dir.join("traits.csv");
        let mut warnings = Warnings::new();
        let set = assemble(&observations(), 3, &modes(false, true), Some(PlotField::Area), "a.png".into(), &mut warnings);
        write_csv(&set, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "roi,area,width,height,perimeter,index,mean,median,std,plot_value");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("3,9.0,"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
