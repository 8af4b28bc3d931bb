mod batch;
mod report;

use std::path::Path;

use image::{DynamicImage, RgbImage};

pub use batch::*;
pub use report::*;

use crate::{
    detection::{Classification, Detection},
    error::CropsightError,
    inference::{
        classify::{ClsSession, YoloCls},
        detect::{ModelFamily, Yolo, YoloSession},
    },
};

/// Boxed-object detector seen by the batch runner.
pub trait Detect {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>, CropsightError>;
}

/// Crop classifier seen by the batch runner.
pub trait Classify {
    fn classify(&mut self, image: &DynamicImage) -> Result<Classification, CropsightError>;
}

/// Class-activation map backend.
pub trait CamRenderer: Send + Sync {
    /// Heatmap for the detector over a source image, if the backend produced one.
    fn detection(
        &self,
        image_path: &Path,
        family: ModelFamily,
    ) -> Result<Option<RgbImage>, CropsightError>;

    /// Heatmap for the classifier over one crop.
    fn classification(&self, crop: &DynamicImage) -> Result<RgbImage, CropsightError>;
}

impl Detect for YoloSession<Yolo> {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>, CropsightError> {
        YoloSession::detect(self, image)
    }
}

impl Classify for ClsSession<YoloCls> {
    fn classify(&mut self, image: &DynamicImage) -> Result<Classification, CropsightError> {
        ClsSession::classify(self, image)
    }
}
