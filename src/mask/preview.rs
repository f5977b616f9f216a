use std::fs;
use std::path::Path;

use super::morphology::binary_image;
use crate::data::model::Mask;
use crate::error::Result;

/// Write a mask as an 8-bit PNG, 255 foreground / 0 background.
pub fn write_mask_preview(mask: &Mask, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let img = binary_image(mask.data());
    log::info!("Writing mask preview to {}", path.display());
    img.save(path)?;
    Ok(())
}

/// Read a mask preview back; pixels above 127 are foreground.
pub fn read_mask_preview(path: &Path) -> Result<Mask> {
    let img = image::open(path)?.into_luma8();
    Ok(Mask::from_fn(img.height() as usize, img.width() as usize, |(r, c)| {
        img.get_pixel(c as u32, r as u32)[0] > 127
    }))
}
