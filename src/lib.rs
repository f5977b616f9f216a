pub mod analysis;
pub mod color;
pub mod data;
pub mod error;
pub mod labeling;
pub mod mask;
pub mod notify;
pub mod results;
pub mod roi;
pub mod settings;
pub mod warnings;
pub mod workflow;

pub use error::{AnalysisError, Result};
pub use settings::Settings;
