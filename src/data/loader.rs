use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use ndarray::Array3;

use super::model::{DataType, SpectralCube};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a spectral cube from its header file.  Dispatch by extension.
///
/// Only ENVI cubes are supported: the path must name the `.hdr` header and
/// the raw samples must sit next to it (same stem, no extension, or
/// `.raw` / `.img`).
pub fn load_file(path: &Path) -> Result<SpectralCube> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "hdr" => load_envi(path),
        _ => Err(AnalysisError::InvalidInputFormat(path.to_path_buf())),
    }
}

// ---------------------------------------------------------------------------
// ENVI header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interleave {
    Bsq,
    Bil,
    Bip,
}

/// The header fields the reader understands.
#[derive(Debug, Clone)]
struct EnviHeader {
    samples: usize,
    lines: usize,
    bands: usize,
    data_type: DataType,
    interleave: Interleave,
    big_endian: bool,
    header_offset: usize,
    wavelengths: Vec<f64>,
}

/// Split a header into lowercase keys and raw values.  Brace-delimited
/// values may span several lines.
fn parse_header_fields(text: &str) -> std::result::Result<BTreeMap<String, String>, String> {
    let mut lines = text.lines();
    match lines.next() {
        Some(first) if first.trim() == "ENVI" => {}
        _ => return Err("first line is not 'ENVI'".to_string()),
    }

    let mut fields = BTreeMap::new();
    let mut pending: Option<(String, String)> = None;

    for line in lines {
        if let Some((key, mut value)) = pending.take() {
            value.push(' ');
            value.push_str(line.trim());
            if line.contains('}') {
                fields.insert(key, value);
            } else {
                pending = Some((key, value));
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().to_string();
        if value.starts_with('{') && !value.contains('}') {
            pending = Some((key, value));
        } else {
            fields.insert(key, value);
        }
    }

    if let Some((key, _)) = pending {
        return Err(format!("unterminated value for '{key}'"));
    }
    Ok(fields)
}

fn parse_brace_list(value: &str) -> std::result::Result<Vec<f64>, String> {
    value
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(str::trim)
        .filter(|tok| !tok.is_empty())
        .map(|tok| tok.parse::<f64>().map_err(|_| format!("'{tok}' is not a number")))
        .collect()
}

fn parse_header(path: &Path, text: &str) -> Result<EnviHeader> {
    let malformed = |reason: String| AnalysisError::MalformedHeader {
        path: path.to_path_buf(),
        reason,
    };

    let fields = parse_header_fields(text).map_err(malformed)?;

    let required = |key: &str| -> Result<usize> {
        let raw = fields
            .get(key)
            .ok_or_else(|| malformed(format!("missing '{key}'")))?;
        raw.parse::<usize>()
            .map_err(|_| malformed(format!("'{key}' = '{raw}' is not an integer")))
    };
    let optional = |key: &str, default: usize| -> Result<usize> {
        match fields.get(key) {
            Some(_) => required(key),
            None => Ok(default),
        }
    };

    let dimension = |key: &str| -> Result<usize> {
        match required(key)? {
            0 => Err(malformed(format!("'{key}' must be positive"))),
            n => Ok(n),
        }
    };

    let samples = dimension("samples")?;
    let lines = dimension("lines")?;
    let bands = dimension("bands")?;
    let code = required("data type")?;
    let data_type = DataType::from_envi_code(code as u32)
        .ok_or_else(|| malformed(format!("unsupported data type {code}")))?;

    let interleave = match fields.get("interleave").map(|s| s.to_ascii_lowercase()) {
        None => Interleave::Bsq,
        Some(s) if s == "bsq" => Interleave::Bsq,
        Some(s) if s == "bil" => Interleave::Bil,
        Some(s) if s == "bip" => Interleave::Bip,
        Some(other) => return Err(malformed(format!("unknown interleave '{other}'"))),
    };

    let wavelengths = match fields.get("wavelength") {
        Some(raw) => parse_brace_list(raw).map_err(malformed)?,
        None => Vec::new(),
    };
    if !wavelengths.is_empty() && wavelengths.len() != bands {
        return Err(malformed(format!(
            "{} wavelengths for {bands} bands",
            wavelengths.len()
        )));
    }

    Ok(EnviHeader {
        samples,
        lines,
        bands,
        data_type,
        interleave,
        big_endian: optional("byte order", 0)? == 1,
        header_offset: optional("header offset", 0)?,
        wavelengths,
    })
}

// ---------------------------------------------------------------------------
// Raw samples
// ---------------------------------------------------------------------------

/// The binary file belonging to a header: same stem without extension,
/// falling back to `.raw` and `.img`.
fn locate_raw(header_path: &Path) -> Option<PathBuf> {
    let stem = header_path.with_extension("");
    [stem.clone(), stem.with_extension("raw"), stem.with_extension("img")]
        .into_iter()
        .find(|p| p.is_file())
}

fn decode_sample(bytes: &[u8], data_type: DataType, big_endian: bool) -> f32 {
    macro_rules! read {
        ($t:ty) => {{
            let arr = bytes.try_into().unwrap_or([0; std::mem::size_of::<$t>()]);
            if big_endian {
                <$t>::from_be_bytes(arr) as f32
            } else {
                <$t>::from_le_bytes(arr) as f32
            }
        }};
    }
    match data_type {
        DataType::U8 => bytes[0] as f32,
        DataType::I16 => read!(i16),
        DataType::U16 => read!(u16),
        DataType::I32 => read!(i32),
        DataType::U32 => read!(u32),
        DataType::F32 => read!(f32),
        DataType::F64 => read!(f64),
        DataType::I64 => read!(i64),
        DataType::U64 => read!(u64),
    }
}

fn load_envi(path: &Path) -> Result<SpectralCube> {
    let text = fs::read_to_string(path).map_err(|source| AnalysisError::CubeRead {
        path: path.to_path_buf(),
        source,
    })?;
    let header = parse_header(path, &text)?;

    let raw_path = locate_raw(path).ok_or_else(|| AnalysisError::CubeRead {
        path: path.with_extension(""),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "raw cube data not found"),
    })?;
    let bytes = fs::read(&raw_path).map_err(|source| AnalysisError::CubeRead {
        path: raw_path.clone(),
        source,
    })?;

    let EnviHeader {
        samples,
        lines,
        bands,
        data_type,
        interleave,
        big_endian,
        header_offset,
        ..
    } = header;

    let size = data_type.size();
    let expected = samples
        .checked_mul(lines)
        .and_then(|n| n.checked_mul(bands))
        .and_then(|n| n.checked_mul(size))
        .and_then(|n| n.checked_add(header_offset))
        .ok_or_else(|| AnalysisError::MalformedHeader {
            path: path.to_path_buf(),
            reason: format!("{samples}x{lines}x{bands} samples overflow the addressable size"),
        })?;
    if bytes.len() < expected {
        return Err(AnalysisError::MalformedHeader {
            path: path.to_path_buf(),
            reason: format!("expected {expected} bytes of data, found {}", bytes.len()),
        });
    }
    let body = &bytes[header_offset..];

    let array_data = Array3::from_shape_fn((lines, samples, bands), |(row, col, band)| {
        let index = match interleave {
            Interleave::Bsq => (band * lines + row) * samples + col,
            Interleave::Bil => (row * bands + band) * samples + col,
            Interleave::Bip => (row * samples + col) * bands + band,
        };
        let start = index * size;
        decode_sample(&body[start..start + size], data_type, big_endian)
    });

    log::info!(
        "Loaded {} ({lines}x{samples}, {bands} bands, {data_type})",
        path.display()
    );

    let pseudo_rgb = pseudo_rgb(&array_data, &header.wavelengths);
    Ok(SpectralCube {
        array_data,
        wavelengths: header.wavelengths,
        pseudo_rgb,
        filename: path.to_path_buf(),
        d_type: data_type,
    })
}

// ---------------------------------------------------------------------------
// Pseudo-RGB preview
// ---------------------------------------------------------------------------

/// Bands used for the red, green and blue channels of the preview.
fn preview_bands(bands: usize, wavelengths: &[f64]) -> [usize; 3] {
    let nearest = |target: f64| {
        wavelengths
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    if wavelengths.len() == bands && bands > 0 {
        [nearest(640.0), nearest(550.0), nearest(480.0)]
    } else {
        let last = bands.saturating_sub(1);
        [last, last / 2, 0]
    }
}

/// Build an 8-bit preview from three bands, scaled jointly by their maximum.
pub fn pseudo_rgb(array_data: &Array3<f32>, wavelengths: &[f64]) -> RgbImage {
    let (height, width, bands) = array_data.dim();
    if bands == 0 {
        return RgbImage::new(width as u32, height as u32);
    }
    let channels = preview_bands(bands, wavelengths);

    let max = channels
        .iter()
        .flat_map(|&b| array_data.index_axis(ndarray::Axis(2), b).into_iter().copied())
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max);
    let scale = if max > 0.0 { 255.0 / max } else { 0.0 };

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let px = |b: usize| {
            let v = array_data[[y as usize, x as usize, b]];
            (v.max(0.0) * scale).round().min(255.0) as u8
        };
        Rgb([px(channels[0]), px(channels[1]), px(channels[2])])
    })
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write a cube as an ENVI header plus BIP raw file next to it.
///
/// `header_path` must end in `.hdr`; the raw data goes to the same path
/// without extension.  Samples are stored little-endian as `d_type`.
pub fn write_envi(
    header_path: &Path,
    array_data: &Array3<f32>,
    wavelengths: &[f64],
    d_type: DataType,
) -> Result<()> {
    let (lines, samples, bands) = array_data.dim();

    let mut header = format!(
        "ENVI\nsamples = {samples}\nlines = {lines}\nbands = {bands}\nheader offset = 0\n\
         file type = ENVI Standard\ndata type = {}\ninterleave = bip\nbyte order = 0\n",
        d_type.envi_code()
    );
    if !wavelengths.is_empty() {
        let list: Vec<String> = wavelengths.iter().map(|w| format!("{w}")).collect();
        header.push_str(&format!("wavelength = {{\n {} }}\n", list.join(",\n ")));
    }

    let mut raw = Vec::with_capacity(lines * samples * bands * d_type.size());
    for &v in array_data.iter() {
        match d_type {
            DataType::U8 => raw.push(v as u8),
            DataType::I16 => raw.extend_from_slice(&(v as i16).to_le_bytes()),
            DataType::U16 => raw.extend_from_slice(&(v as u16).to_le_bytes()),
            DataType::I32 => raw.extend_from_slice(&(v as i32).to_le_bytes()),
            DataType::U32 => raw.extend_from_slice(&(v as u32).to_le_bytes()),
            DataType::F32 => raw.extend_from_slice(&v.to_le_bytes()),
            DataType::F64 => raw.extend_from_slice(&(v as f64).to_le_bytes()),
            DataType::I64 => raw.extend_from_slice(&(v as i64).to_le_bytes()),
            DataType::U64 => raw.extend_from_slice(&(v as u64).to_le_bytes()),
        }
    }

    if let Some(dir) = header_path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(header_path, header)?;
    fs::write(header_path.with_extension(""), raw)?;
    Ok(())
}
