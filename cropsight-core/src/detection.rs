use serde::Serialize;

use crate::analysis::bbox::{Bbox, CenterBox};

/// One detector hit in source-image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: Bbox,
    pub center: CenterBox,
    pub proba: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn new(bbox: Bbox, proba: f32, class_id: usize) -> Self {
        Self {
            bbox,
            center: bbox.to_center_box(),
            proba,
            class_id,
        }
    }
}

/// Top-1 classifier answer for a crop.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Classification {
    pub label_id: usize,
    pub label: String,
    pub proba: f32,
}
