use std::path::PathBuf;

use anyhow::{Context, Result};
use ndarray::Array3;
use serde_json::json;

use rusty_canopy::data::loader::write_envi;
use rusty_canopy::data::model::DataType;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Leaf reflectance: green bump, red absorption, red-edge step to the NIR
/// plateau, water dip near 970 nm.
fn leaf_reflectance(wl: f64, vigour: f64) -> f64 {
    let red_edge = 1.0 / (1.0 + (-(wl - 715.0) / 12.0).exp());
    0.04 + gaussian(wl, 550.0, 25.0, 0.08) + vigour * 0.5 * red_edge - gaussian(wl, 970.0, 20.0, 0.1 * vigour)
}

/// Dry soil: slowly rising, featureless.
fn soil_reflectance(wl: f64) -> f64 {
    0.12 + (wl - 450.0) / 500.0 * 0.08
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Plant centres `(x, y)`, radii and vigour.
const PLANTS: [(f64, f64, f64, f64); 4] = [
    (40.0, 40.0, 14.0, 1.0),
    (120.0, 40.0, 10.0, 0.7),
    (40.0, 120.0, 16.0, 0.9),
    (120.0, 120.0, 8.0, 0.6),
];

fn main() -> Result<()> {
    env_logger::init();
    let out_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("sample"));
    let mut rng = SimpleRng::new(42);

    // 450 → 1000 nm, step 10
    let wavelengths: Vec<f64> = (0..56).map(|i| 450.0 + i as f64 * 10.0).collect();
    let (height, width) = (160, 160);

    let mut cube = Array3::<f32>::zeros((height, width, wavelengths.len()));
    for r in 0..height {
        for c in 0..width {
            let plant = PLANTS.iter().find(|&&(x, y, radius, _)| {
                let (dx, dy) = (c as f64 - x, r as f64 - y);
                dx * dx + dy * dy <= radius * radius
            });
            for (b, &wl) in wavelengths.iter().enumerate() {
                let base = match plant {
                    Some(&(_, _, _, vigour)) => leaf_reflectance(wl, vigour),
                    None => soil_reflectance(wl),
                };
                cube[[r, c, b]] = (base + rng.gauss(0.0, 0.005)).max(0.0) as f32;
            }
        }
    }

    let header = out_dir.join("plants.hdr");
    write_envi(&header, &cube, &wavelengths, DataType::F32)
        .with_context(|| format!("writing {}", header.display()))?;

    let roi_items: Vec<_> = PLANTS
        .iter()
        .enumerate()
        .map(|(i, &(x, y, radius, _))| {
            let size = radius * 2.0 + 6.0;
            let shape = if i % 2 == 0 { "Circle" } else { "Rectangle" };
            json!([shape, x, y, size, size])
        })
        .collect();

    let settings = json!({
        "inputImage": header,
        "outputFolder": out_dir.join("out"),
        "outputImage": out_dir.join("out").join("mask_preview.png"),
        "experimentSettings": {
            "roiInfo": { "roiItems": roi_items },
            "analysis": {
                "maskOptions": { "wavelength": "800", "wl_thresh": 0.3, "fill_size": 10, "dilate_pixel": false },
                "scriptOptions": { "general": { "analyze_index": true, "index_selection": "ndvi",
                                                "analyze_shape": true, "line_width": 2 } },
                "chartOptions": { "plot_selection": "plot_index" }
            },
            "imageOptions": { "lensAngle": 0, "normalize": false }
        }
    });
    let settings_path = out_dir.join("settings.json");
    std::fs::write(&settings_path, serde_json::to_string_pretty(&settings)?)
        .with_context(|| format!("writing {}", settings_path.display()))?;

    println!(
        "Wrote {}x{} cube ({} bands, {} plants) and {}",
        width,
        height,
        wavelengths.len(),
        PLANTS.len(),
        settings_path.display()
    );
    Ok(())
}
