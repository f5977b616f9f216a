use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

use ndarray::Array3;
use serde_json::json;

use rusty_canopy::data::loader::write_envi;
use rusty_canopy::data::model::DataType;
use rusty_canopy::mask::preview::read_mask_preview;
use rusty_canopy::mask::{MaskRegistry, ThresholdMask};
use rusty_canopy::notify::{feed, Message, Notification};
use rusty_canopy::results::{chart_labels, ObjectTraits};
use rusty_canopy::roi::OUTLINE_COLOR;
use rusty_canopy::warnings::{Warning, Warnings};
use rusty_canopy::workflow::{execute, preview_mask, processed_image_path, run_batch, Job};
use rusty_canopy::{AnalysisError, Settings};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rusty-canopy-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// 100×100 cube, bands at 670 and 800 nm, one plant block covering rows and
/// columns 40..60: reflectance 0.2 / 0.6 on the plant, 0.1 / 0.1 elsewhere.
fn write_scene(dir: &Path) -> PathBuf {
    let cube = Array3::from_shape_fn((100, 100, 2), |(r, c, b)| {
        let plant = (40..60).contains(&r) && (40..60).contains(&c);
        match (plant, b) {
            (true, 0) => 0.2f32,
            (true, _) => 0.6,
            _ => 0.1,
        }
    });
    let header = dir.join("plants.hdr");
    write_envi(&header, &cube, &[670.0, 800.0], DataType::F32).unwrap();
    header
}

fn settings(dir: &Path, rois: serde_json::Value, analyze_index: bool, analyze_shape: bool, plot: &str) -> Settings {
    let value = json!({
        "inputImage": write_scene(dir),
        "outputFolder": dir.join("out"),
        "outputImage": dir.join("out").join("mask.png"),
        "calibrationFolder": dir.join("calibration"),
        "experimentSettings": {
            "roiInfo": { "roiItems": rois },
            "analysis": {
                "maskOptions": { "wavelength": 800, "wl_thresh": 0.3, "fill_size": 0, "dilate_pixel": false },
                "scriptOptions": { "general": { "analyze_index": analyze_index, "index_selection": "ndvi",
                                                "analyze_shape": analyze_shape, "line_width": 1 } },
                "chartOptions": { "plot_selection": plot }
            },
            "imageOptions": { "lensAngle": 0, "normalize": false }
        }
    });
    Settings::from_json(&value.to_string()).unwrap()
}

fn one_rectangle() -> serde_json::Value {
    json!([["Rectangle", 50, 50, 20, 20]])
}

// ---------------------------------------------------------------------------
// Single runs
// ---------------------------------------------------------------------------

#[test]
fn rectangle_over_plant_gives_one_shape_record() {
    let dir = scratch_dir("shape");
    let settings = settings(&dir, one_rectangle(), false, true, "area");
    let (run, rx) = feed("shape-run");
    let mut warnings = Warnings::new();

    let results = execute(&run, &settings, &ThresholdMask, &mut warnings).unwrap();

    assert_eq!(results.records.len(), 1);
    let record = &results.records[0];
    assert_eq!(record.roi, 1);
    let shape = record.traits.shape().unwrap();
    assert_eq!(shape.area, 400.0);
    assert_eq!((shape.width, shape.height), (20.0, 20.0));
    assert!(record.traits.index_name().is_none());
    assert_eq!(record.plot_value, Some(400.0));
    assert!(warnings.is_empty());

    let expected_image = processed_image_path(&dir.join("out"), "plants");
    assert_eq!(results.image_file_name, expected_image);
    assert!(expected_image.exists());

    let messages: Vec<Message> = rx.try_iter().collect();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.run_id == "shape-run"));
    assert!(matches!(&messages[0].notification, Notification::Progress(t) if t.starts_with("Processing: ") && t.ends_with("plants.hdr")));
    assert_eq!(messages[1].notification, Notification::Preview(expected_image));
    assert_eq!(messages[2].notification, Notification::Results(results));
}

#[test]
fn published_preview_shows_roi_and_object_outlines() {
    let dir = scratch_dir("outlines");
    let rois = json!([["Rectangle", 50, 50, 30, 30]]);
    let settings = settings(&dir, rois, false, true, "area");
    let (run, _rx) = feed("outlines-run");

    let results = execute(&run, &settings, &ThresholdMask, &mut Warnings::new()).unwrap();

    let img = image::open(&results.image_file_name).unwrap().into_rgb8();
    let background = *img.get_pixel(37, 37);
    assert_eq!(img.get_pixel(35, 35), &OUTLINE_COLOR);
    assert_eq!(img.get_pixel(64, 50), &OUTLINE_COLOR);
    assert_ne!(background, OUTLINE_COLOR);
    // plant contour drawn in the palette colour
    assert_ne!(img.get_pixel(45, 40), &background);
    assert_ne!(img.get_pixel(45, 40), &OUTLINE_COLOR);
}

#[test]
fn unsupported_roi_shape_truncates_with_a_warning() {
    let dir = scratch_dir("triangle");
    let rois = json!([["Circle", 50, 50, 20, 20], ["Triangle", 20, 20, 10, 10]]);
    let settings = settings(&dir, rois, false, true, "area");
    let (run, _rx) = feed("triangle-run");
    let mut warnings = Warnings::new();

    let results = execute(&run, &settings, &ThresholdMask, &mut warnings).unwrap();

    assert_eq!(results.records.len(), 1);
    // the circle touches the block, which is claimed whole
    assert_eq!(results.records[0].traits.shape().unwrap().area, 400.0);
    assert_eq!(warnings.into_vec(), vec![Warning::UnsupportedRoiShape("Triangle".into())]);
}

#[test]
fn index_and_shape_fill_the_same_record() {
    let dir = scratch_dir("both");
    let settings = settings(&dir, one_rectangle(), true, true, "plot_index");
    let (run, _rx) = feed("both-run");

    let results = execute(&run, &settings, &ThresholdMask, &mut Warnings::new()).unwrap();

    let record = &results.records[0];
    let ObjectTraits::Both { shape, name, stats } = &record.traits else {
        panic!("expected shape and index traits, got {:?}", record.traits);
    };
    assert_eq!(shape.area, 400.0);
    assert_eq!(name, "ndvi");
    assert!((stats.mean - 0.5).abs() < 1e-6);
    assert!(stats.std.abs() < 1e-6);
    assert_eq!(record.plot_value, Some(stats.mean));

    let (title, axis) = chart_labels(&settings).unwrap();
    assert_eq!(title, "Normalized Difference Vegetation Index (NDVI)");
    assert_eq!(axis, "relative index value");
}

#[test]
fn no_analysis_mode_keeps_ids_only() {
    let dir = scratch_dir("neither");
    let settings = settings(&dir, one_rectangle(), false, false, "area");
    let (run, _rx) = feed("neither-run");

    let results = execute(&run, &settings, &ThresholdMask, &mut Warnings::new()).unwrap();

    assert_eq!(results.records.len(), 1);
    assert_eq!(results.records[0].traits, ObjectTraits::None);
    assert_eq!(results.records[0].plot_value, None);
    assert_eq!(chart_labels(&settings).unwrap(), (String::new(), String::new()));
}

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

#[test]
fn unpopulated_plot_selection_fails_before_processing() {
    let dir = scratch_dir("plot");
    let settings = settings(&dir, one_rectangle(), true, false, "area");
    let (run, rx) = feed("plot-run");

    let err = execute(&run, &settings, &ThresholdMask, &mut Warnings::new()).unwrap_err();

    assert!(matches!(err, AnalysisError::InvalidPlotSelection(s) if s == "area"));
    assert_eq!(rx.try_iter().count(), 0);
}

#[test]
fn unknown_index_stops_before_any_artifact() {
    let dir = scratch_dir("index");
    let mut settings = settings(&dir, one_rectangle(), true, false, "plot_index");
    settings.experiment_settings.analysis.script_options.general.index_selection = "xyz".into();
    let (run, rx) = feed("index-run");

    let err = execute(&run, &settings, &ThresholdMask, &mut Warnings::new()).unwrap_err();

    assert!(matches!(err, AnalysisError::UnknownIndexSelection(_)));
    let messages: Vec<Message> = rx.try_iter().collect();
    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0].notification, Notification::Progress(_)));
    assert!(!processed_image_path(&dir.join("out"), "plants").exists());
}

#[test]
fn non_header_input_is_rejected() {
    let dir = scratch_dir("format");
    let mut settings = settings(&dir, one_rectangle(), false, true, "area");
    settings.input_image = dir.join("plants.tif");
    let (run, rx) = feed("format-run");

    let err = execute(&run, &settings, &ThresholdMask, &mut Warnings::new()).unwrap_err();

    assert!(matches!(err, AnalysisError::InvalidInputFormat(_)));
    assert_eq!(rx.try_iter().count(), 0);
}

#[test]
fn missing_lens_calibration_is_fatal() {
    let dir = scratch_dir("lens");
    let mut settings = settings(&dir, one_rectangle(), false, true, "area");
    settings.experiment_settings.image_options.lens_angle = 30;
    let (run, _rx) = feed("lens-run");

    let err = execute(&run, &settings, &ThresholdMask, &mut Warnings::new()).unwrap_err();

    assert!(matches!(err, AnalysisError::MissingCalibrationData { angle: 30, .. }));
}

// ---------------------------------------------------------------------------
// Mask preview and batches
// ---------------------------------------------------------------------------

#[test]
fn mask_preview_reads_back_identically() {
    let dir = scratch_dir("preview");
    let settings = settings(&dir, one_rectangle(), false, true, "area");

    let mask = preview_mask(&settings, &ThresholdMask, &mut Warnings::new()).unwrap();

    assert_eq!(mask.count(), 400);
    let stored = read_mask_preview(&dir.join("out").join("mask.png")).unwrap();
    assert_eq!(stored, mask);
}

#[test]
fn mask_preview_without_output_image_is_fatal() {
    let dir = scratch_dir("preview-target");
    let mut settings = settings(&dir, one_rectangle(), false, true, "area");
    settings.output_image = None;

    let err = preview_mask(&settings, &ThresholdMask, &mut Warnings::new()).unwrap_err();

    assert!(matches!(err, AnalysisError::MissingOutputImage));
    assert!(!dir.join("out").exists());
}

#[test]
fn batch_runs_keep_per_run_order() {
    let jobs: Vec<Job> = ["a", "b", "c"]
        .into_iter()
        .map(|name| Job {
            run_id: format!("run-{name}"),
            settings: settings(&scratch_dir(&format!("batch-{name}")), one_rectangle(), true, true, "area"),
        })
        .collect();
    let (tx, rx) = channel();

    let outcomes = run_batch(jobs, &MaskRegistry::default(), tx);

    assert_eq!(outcomes.len(), 3);
    for outcome in &outcomes {
        assert_eq!(outcome.result.as_ref().unwrap().records.len(), 1);
    }
    assert_eq!(outcomes[1].run_id, "run-b");

    let messages: Vec<Message> = rx.iter().collect();
    assert_eq!(messages.len(), 9);
    for name in ["a", "b", "c"] {
        let kinds: Vec<&str> = messages
            .iter()
            .filter(|m| m.run_id == format!("run-{name}"))
            .map(|m| match m.notification {
                Notification::Progress(_) => "progress",
                Notification::Preview(_) => "preview",
                Notification::Results(_) => "results",
            })
            .collect();
        assert_eq!(kinds, ["progress", "preview", "results"]);
    }
}

#[test]
fn unknown_mask_strategy_fails_the_run() {
    let mut settings = settings(&scratch_dir("strategy"), one_rectangle(), false, true, "area");
    settings.mask_strategy = Some("watershed".into());
    let (tx, rx) = channel();

    let outcomes = run_batch(
        vec![Job {
            run_id: "strategy-run".into(),
            settings,
        }],
        &MaskRegistry::default(),
        tx,
    );

    assert!(matches!(&outcomes[0].result, Err(AnalysisError::UnknownMaskStrategy(n)) if n == "watershed"));
    assert_eq!(rx.iter().count(), 0);
}
