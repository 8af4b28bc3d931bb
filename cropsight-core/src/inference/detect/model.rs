use std::{
    fmt,
    path::{Path, PathBuf},
};

use ndarray::{ArrayBase, Dim, OwnedRepr};
use serde::Serialize;

use crate::{
    consts::{
        BACKGROUND_FILL_VALUE, BATCH_SIZE, CXYWH_OFFSET, DETECT_MODEL_DIR, INPUT_CHANNELS,
        MODEL_INPUT_SIZE, NMS_IOU_THRESHOLD, PROBA_THRESHOLD,
    },
    inference::model::Model,
};

/// Detector families the service can load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// Anchor-free head with `[4 + classes, anchors]` output, needs NMS.
    V8,
    /// End-to-end head with `[detections, 6]` output, NMS-free.
    V10,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 2] = [ModelFamily::V8, ModelFamily::V10];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::V8 => "v8",
            ModelFamily::V10 => "v10",
        }
    }

    /// Parses the request spelling of a family.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|family| family.as_str() == value)
    }

    /// Weights location under the models directory.
    pub fn weights(&self, models_dir: &Path) -> PathBuf {
        models_dir
            .join(DETECT_MODEL_DIR)
            .join(format!("YOLO{}M.onnx", self.as_str()))
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type YoloInput = ArrayBase<OwnedRepr<f32>, Dim<[usize; 4]>>;
pub type YoloOutput = ArrayBase<OwnedRepr<f32>, Dim<[usize; 3]>>;

pub struct YoloConfig {
    pub required_width: usize,
    pub required_height: usize,
    pub batch_size: usize,
    pub input_channels: usize,
    pub background_fill_value: f32,
    pub cxywh_size: usize,
    pub proba_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            required_width: MODEL_INPUT_SIZE,
            required_height: MODEL_INPUT_SIZE,
            batch_size: BATCH_SIZE,
            input_channels: INPUT_CHANNELS,
            background_fill_value: BACKGROUND_FILL_VALUE,
            cxywh_size: CXYWH_OFFSET,
            proba_threshold: PROBA_THRESHOLD,
            iou_threshold: NMS_IOU_THRESHOLD,
        }
    }
}

pub struct Yolo {
    family: ModelFamily,
    name: String,
    path: PathBuf,
    config: YoloConfig,
}

impl Yolo {
    pub fn new(family: ModelFamily, models_dir: &Path) -> Self {
        Self::with_config(family, models_dir, YoloConfig::default())
    }

    pub fn with_config(family: ModelFamily, models_dir: &Path, config: YoloConfig) -> Self {
        Self {
            family,
            name: format!("yolo{}m", family.as_str()),
            path: family.weights(models_dir),
            config,
        }
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }
}

impl Model for Yolo {
    type Input = YoloInput;

    type Output = YoloOutput;
    type Config = YoloConfig;

    const INPUT_NAME: &'static str = "images";

    const OUTPUT_NAME: &'static str = "output0";

    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parse() {
        assert_eq!(ModelFamily::parse("v8"), Some(ModelFamily::V8));
        assert_eq!(ModelFamily::parse("v10"), Some(ModelFamily::V10));
        assert_eq!(ModelFamily::parse("V8"), None);
        assert_eq!(ModelFamily::parse("v9"), None);
        assert_eq!(ModelFamily::parse("__import__('os')"), None);
    }

    #[test]
    fn test_family_weights() {
        let dir = Path::new("models");
        assert_eq!(
            ModelFamily::V10.weights(dir),
            Path::new("models/detect/YOLOv10M.onnx")
        );
        assert_eq!(
            Yolo::new(ModelFamily::V8, dir).path(),
            Path::new("models/detect/YOLOv8M.onnx")
        );
    }
}
