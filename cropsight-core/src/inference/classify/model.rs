use std::path::{Path, PathBuf};

use ndarray::{ArrayBase, Dim, OwnedRepr};

use crate::{
    consts::{BATCH_SIZE, CLASSIFY_MODEL_PATH, INPUT_CHANNELS, MODEL_INPUT_SIZE},
    inference::model::Model,
};

pub type YoloClsInput = ArrayBase<OwnedRepr<f32>, Dim<[usize; 4]>>;
pub type YoloClsOutput = ArrayBase<OwnedRepr<f32>, Dim<[usize; 2]>>;

/// Configuration for the crop classifier.
#[derive(Debug, Clone)]
pub struct YoloClsConfig {
    /// Side of the square model input.
    ///
    /// Crops are resized so their shorter side matches this value and then
    /// center-cropped to a square.
    pub required_size: usize,

    /// Batch size for model inference. Only 1 is used.
    pub batch_size: usize,

    /// Number of input channels (RGB = 3).
    pub input_channels: usize,

    /// Tolerance when deciding whether raw scores already form a distribution.
    pub probability_tolerance: f32,
}

impl Default for YoloClsConfig {
    fn default() -> Self {
        Self {
            required_size: MODEL_INPUT_SIZE,
            batch_size: BATCH_SIZE,
            input_channels: INPUT_CHANNELS,
            probability_tolerance: 1e-3,
        }
    }
}

pub struct YoloCls {
    path: PathBuf,
    config: YoloClsConfig,
}

impl YoloCls {
    pub fn new(models_dir: &Path) -> Self {
        Self::with_config(models_dir, YoloClsConfig::default())
    }

    pub fn with_config(models_dir: &Path, config: YoloClsConfig) -> Self {
        Self {
            path: models_dir.join(CLASSIFY_MODEL_PATH),
            config,
        }
    }
}

impl Model for YoloCls {
    type Input = YoloClsInput;

    type Output = YoloClsOutput;

    type Config = YoloClsConfig;

    const INPUT_NAME: &'static str = "images";

    const OUTPUT_NAME: &'static str = "output0";

    fn name(&self) -> &str {
        "yolov8m-cls"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}
