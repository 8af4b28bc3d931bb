/// The number of values representing bounding box coordinates in YOLO format.
///
/// YOLOv8 heads emit `[center_x, center_y, width, height]` followed by one
/// score per class, so class scores begin at this offset.
pub const CXYWH_OFFSET: usize = 4;

/// Width of one YOLOv10 detection row: `[x_min, y_min, x_max, y_max, score, class]`.
pub const XYXY_SCORE_CLASS_SIZE: usize = 6;

/// Square input side used for both the detector and the classifier.
pub const MODEL_INPUT_SIZE: usize = 512;

/// Minimum confidence for keeping a detection.
pub const PROBA_THRESHOLD: f32 = 0.25;

/// IoU threshold for Non-Maximum Suppression on YOLOv8 outputs.
pub const NMS_IOU_THRESHOLD: f32 = 0.7;

/// Number of color channels in the model input.
pub const INPUT_CHANNELS: usize = 3;

/// Batch size for model inference.
pub const BATCH_SIZE: usize = 1;

/// Letterbox padding value (114/255).
pub const BACKGROUND_FILL_VALUE: f32 = 114.0 / 255.0;

/// Classifier crop side as a multiple of the detection height.
pub const CROP_CONTEXT_SCALE: f32 = 3.0;

/// Neighbouring detections are considered only when both corner offsets are
/// below this multiple of the target height.
pub const PROXIMITY_FACTOR: f32 = 2.0;

/// Classifier label index drawn in green; every other label is drawn in blue.
pub const HIGHLIGHT_LABEL: usize = 1;

pub const HIGHLIGHT_COLOR: [u8; 3] = [0, 255, 0];

pub const DEFAULT_COLOR: [u8; 3] = [0, 0, 255];

/// Caption size in pixels for detection overlays.
pub const CAPTION_SCALE: f32 = 48.0;

/// Vertical gap between a caption and its box.
pub const CAPTION_OFFSET: i32 = 10;

pub const DETECTION_IMAGE: &str = "detection.jpg";

pub const CAM_DETECTION_IMAGE: &str = "cam_detection.jpg";

pub const CLASSIFICATION_DIR: &str = "classification";

/// Detector weights for a family live at `<models>/detect/YOLO<family>M.onnx`.
pub const DETECT_MODEL_DIR: &str = "detect";

pub const CLASSIFY_MODEL_PATH: &str = "classification/YOLOv8M-cls.onnx";
