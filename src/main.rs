use std::path::PathBuf;
use std::sync::mpsc::channel;

use anyhow::{Context, Result};
use clap::Parser;

use rusty_canopy::mask::MaskRegistry;
use rusty_canopy::notify::Feed;
use rusty_canopy::results::{chart_labels, write_csv};
use rusty_canopy::warnings::Warnings;
use rusty_canopy::workflow::{execute, preview_mask};
use rusty_canopy::Settings;

#[derive(Debug, Parser)]
#[command(version, about = "Segment plants in a spectral image and extract per-plant traits.")]
struct Cli {
    /// Settings bundle (JSON)
    settings: PathBuf,

    /// Run id prefixed to every emitted message
    #[arg(long, default_value = "rusty-canopy")]
    run_id: String,

    /// Registered mask strategy, overriding `maskStrategy` in the settings
    #[arg(long)]
    mask_strategy: Option<String>,

    /// Only build the mask and write it to `outputImage`
    #[arg(long)]
    preview_mask: bool,

    /// Also export the trait records as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut settings = Settings::from_file(&cli.settings)
        .with_context(|| format!("loading settings {}", cli.settings.display()))?;
    if cli.mask_strategy.is_some() {
        settings.mask_strategy = cli.mask_strategy.clone();
    }

    let registry = MaskRegistry::default();
    let strategy = registry.select(&settings)?;
    let mut warnings = Warnings::new();

    if cli.preview_mask {
        let mask = preview_mask(&settings, strategy.as_ref(), &mut warnings).context("building mask preview")?;
        log::info!("Mask preview has {} plant pixels", mask.count());
        return Ok(());
    }

    let (title, axis) = chart_labels(&settings)?;
    log::info!("Chart: '{title}' / '{axis}'");

    let (tx, rx) = channel();
    let feed = Feed::new(cli.run_id.clone(), tx);
    let outcome = execute(&feed, &settings, strategy.as_ref(), &mut warnings);
    drop(feed);

    for message in rx.iter() {
        println!("{}", serde_json::to_string(&message)?);
    }

    let results = outcome.with_context(|| format!("analyzing {}", settings.input_image.display()))?;
    if let Some(path) = &cli.csv {
        write_csv(&results, path).with_context(|| format!("writing {}", path.display()))?;
    }
    if !warnings.is_empty() {
        log::info!("Finished with {} warnings", warnings.len());
    }
    Ok(())
}
