//! Data layer: cube types, loading, and preparation.
//!
//! Architecture:
//! ```text
//!  plants.hdr + plants(.raw)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse ENVI header + samples → SpectralCube
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  prepare  │  8-bit rescale, dark normalize,
//!   └──────────┘  undistort (calibration)
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │ SpectralCube  │  [row, col, band] f32 + pseudo-RGB
//!   └──────────────┘
//! ```

pub mod calibration;
pub mod loader;
pub mod model;
pub mod prepare;
