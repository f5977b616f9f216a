use std::collections::BTreeSet;

use ndarray::Array2;

use crate::data::model::{LabeledObjectMap, Mask};
use crate::mask::morphology::{connected_components, Connectivity};
use crate::roi::RoiCollection;

/// Turn the mask into one object per ROI ("partial" overlap).
///
/// Every 8-connected mask component touching an ROI joins that ROI's
/// object, whole, even where it extends past the ROI.  When several ROIs
/// reach the same component the last one in order keeps it.  Ids are then
/// handed out in ROI order to the ROIs still holding a component, so they
/// stay contiguous.
pub fn create_labels(mask: &Mask, rois: &RoiCollection) -> LabeledObjectMap {
    let (height, width) = (mask.height(), mask.width());
    if rois.is_empty() || mask.count() == 0 {
        return LabeledObjectMap::background(height, width);
    }

    let components = connected_components(mask.data(), Connectivity::Eight);
    let mut owner: Vec<Option<usize>> = vec![None; components.len()];
    for (i, roi) in rois.iter().enumerate() {
        for (r, c) in roi.pixels() {
            if let Some(idx) = components.grid[[r, c]].checked_sub(1) {
                owner[idx as usize] = Some(i);
            }
        }
    }

    let owning: BTreeSet<usize> = owner.iter().flatten().copied().collect();
    let mut ids = vec![0u32; rois.len()];
    let mut count = 0u32;
    for (i, roi) in rois.iter().enumerate() {
        if owning.contains(&i) {
            count += 1;
            ids[i] = count;
            log::debug!("{} → plant_{count}", roi.label);
        } else {
            log::debug!("{} holds no plant pixels", roi.label);
        }
    }

    let mut labels = Array2::<u32>::zeros((height, width));
    for (idx, roi) in owner.iter().enumerate() {
        let Some(roi) = roi else { continue };
        for &(r, c) in &components.pixels[idx] {
            labels[[r, c]] = ids[*roi];
        }
    }

    log::info!("Identified {count} objects in {} rois", rois.len());
    LabeledObjectMap::new(labels, count)
}
