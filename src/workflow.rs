use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use crate::analysis::{analyze, AnalysisConfig, AnalysisModes};
use crate::data::model::Mask;
use crate::error::Result;
use crate::labeling::create_labels;
use crate::mask::{create_mask, MaskRegistry, MaskStrategy};
use crate::notify::{Feed, Message};
use crate::results::{assemble, resolve_plot_field, ResultSet};
use crate::roi::process_rois;
use crate::settings::Settings;
use crate::warnings::{Warning, Warnings};

/// Folder under `outputFolder` receiving annotated previews.
pub const PROCESSED_IMAGES: &str = "ProcessedImages";

/// `<output_folder>/ProcessedImages/<image_name>.png`
pub fn processed_image_path(output_folder: &Path, image_name: &str) -> PathBuf {
    output_folder.join(PROCESSED_IMAGES).join(format!("{image_name}.png"))
}

// ---------------------------------------------------------------------------
// Single image
// ---------------------------------------------------------------------------

/// Analyze one image end-to-end.
///
/// Sends, in order, a progress message naming the source file, the path of
/// the annotated preview and the assembled results.  Any error stops the run
/// before the results message.
pub fn execute(
    feed: &Feed,
    settings: &Settings,
    strategy: &dyn MaskStrategy,
    warnings: &mut Warnings,
) -> Result<ResultSet> {
    let modes = AnalysisModes::from(settings.general());
    let plot = resolve_plot_field(settings.plot_selection(), &modes)?;
    let config = AnalysisConfig {
        line_width: settings.general().line_width,
    };

    log::info!("Starting workflow with mask strategy '{}'", strategy.name());
    let (cube, mask) = create_mask(settings, strategy, false, warnings)?;
    feed.progress(format!("Processing: {}", cube.filename.display()))?;

    let rois = process_rois(settings.roi_items(), &cube.pseudo_rgb, warnings);
    let labels = create_labels(&mask, &rois);
    let analysis = analyze(&cube, &labels, &modes, &config)?;

    let image_file_name = processed_image_path(&settings.output_folder, &cube.image_name());
    if let Some(parent) = image_file_name.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
            log::info!("Created folder {}", parent.display());
        }
    }
    let mut annotated = analysis.annotated;
    rois.draw_outlines(&mut annotated);
    annotated.save(&image_file_name)?;
    log::info!("Wrote image to {}", image_file_name.display());
    feed.preview(image_file_name.clone())?;

    let results = assemble(
        &analysis.observations,
        labels.count(),
        &modes,
        plot,
        image_file_name,
        warnings,
    );
    feed.results(results.clone())?;
    log::info!("Workflow done: {} records", results.records.len());
    Ok(results)
}

/// Build the mask only and write it to `outputImage`.
pub fn preview_mask(settings: &Settings, strategy: &dyn MaskStrategy, warnings: &mut Warnings) -> Result<Mask> {
    let (_, mask) = create_mask(settings, strategy, true, warnings)?;
    Ok(mask)
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// One image to analyze under its own run id.
#[derive(Debug, Clone)]
pub struct Job {
    pub run_id: String,
    pub settings: Settings,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub result: Result<ResultSet>,
    pub warnings: Vec<Warning>,
}

/// Run every job on its own scoped thread, all feeding `tx`.
///
/// Outcomes come back in job order; messages of different runs interleave
/// freely on the channel.
pub fn run_batch(jobs: Vec<Job>, registry: &MaskRegistry, tx: Sender<Message>) -> Vec<RunOutcome> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let feed = Feed::new(job.run_id.clone(), tx.clone());
                scope.spawn(move || {
                    let mut warnings = Warnings::new();
                    let result = registry
                        .select(&job.settings)
                        .and_then(|strategy| execute(&feed, &job.settings, strategy.as_ref(), &mut warnings));
                    if let Err(e) = &result {
                        log::error!("Run {} failed: {e}", job.run_id);
                    }
                    RunOutcome {
                        run_id: job.run_id,
                        result,
                        warnings: warnings.into_vec(),
                    }
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(outcome) => outcome,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
