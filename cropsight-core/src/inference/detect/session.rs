use std::time::Instant;

use glam::Vec2;
use image::{DynamicImage, GenericImageView, imageops::FilterType};
use ndarray::prelude::*;
use ort::{
    session::{Session, builder::SessionBuilder},
    value::TensorRef,
};
use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::{
    analysis::bbox::Bbox,
    consts::XYXY_SCORE_CLASS_SIZE,
    detection::Detection,
    error::*,
    inference::{
        detect::model::{ModelFamily, Yolo},
        model::{Model, OnnxSession, commit},
    },
};

pub struct YoloSession<M: Model> {
    session: Session,
    model: M,
}

/// Geometry of a letterboxed image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageMeta {
    pub image_size: Vec2,
    pub resized: Vec2,
    pub scale: f32,
    pub offset: Vec2,
}

impl ImageMeta {
    /// Fits `width × height` inside the target while keeping the aspect ratio, centered.
    pub fn letterbox(width: u32, height: u32, target_w: usize, target_h: usize) -> Self {
        let (w0, h0) = (width as f32, height as f32);
        let scale = f32::min(target_w as f32 / w0, target_h as f32 / h0);
        let resized = Vec2::new((w0 * scale).round(), (h0 * scale).round());
        let offset = ((Vec2::new(target_w as f32, target_h as f32) - resized) / 2.0).floor();

        Self {
            image_size: Vec2::new(w0, h0),
            resized,
            scale,
            offset,
        }
    }
}

impl YoloSession<Yolo> {
    pub fn new(session: SessionBuilder, model: Yolo) -> Result<Self, CropsightError> {
        let session = commit(session, &model)?;

        Ok(Self { session, model })
    }

    pub fn meta_for(&self, image: &DynamicImage) -> ImageMeta {
        let config = self.model.config();
        let (w, h) = image.dimensions();
        ImageMeta::letterbox(w, h, config.required_width, config.required_height)
    }

    /// Runs the detector on a full source image.
    pub fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>, CropsightError> {
        let meta = self.meta_for(image);
        let start = Instant::now();
        let detections = self.run(image, meta)?;
        debug!(
            model = self.model.name(),
            detections = detections.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "detector finished"
        );
        Ok(detections)
    }
}

impl OnnxSession<Yolo> for YoloSession<Yolo> {
    type Output = Vec<Detection>;
    type Extra = ImageMeta;

    fn preprocess(&self, image: &DynamicImage) -> Result<<Yolo as Model>::Input, CropsightError> {
        let model_config = self.model.config();
        let meta = self.meta_for(image);

        // Resize image to calculated dimensions
        let resized_img = image.resize_exact(
            meta.resized.x as u32,
            meta.resized.y as u32,
            FilterType::Triangle,
        );

        // Create tensor with background fill value
        let mut input_tensor = Array4::zeros([
            model_config.batch_size,
            model_config.input_channels,
            model_config.required_height,
            model_config.required_width,
        ]);
        input_tensor.fill(model_config.background_fill_value);

        let offset_x = meta.offset.x as usize;
        let offset_y = meta.offset.y as usize;

        // Fill tensor with normalized pixel values
        for (x, y, pixel) in resized_img.pixels() {
            let x = x as usize + offset_x;
            let y = y as usize + offset_y;
            if x >= model_config.required_width || y >= model_config.required_height {
                continue;
            }
            let [r, g, b, _] = pixel.0;
            input_tensor[[0, 0, y, x]] = r as f32 / 255.0;
            input_tensor[[0, 1, y, x]] = g as f32 / 255.0;
            input_tensor[[0, 2, y, x]] = b as f32 / 255.0;
        }

        Ok(input_tensor)
    }

    fn postprocess(
        &self,
        output: <Yolo as Model>::Output,
        extra: Self::Extra,
    ) -> Result<Self::Output, CropsightError> {
        match self.model.family() {
            ModelFamily::V8 => {
                let mut detections = decode_anchor_grid(
                    output.view(),
                    self.model.config().cxywh_size,
                    self.model.config().proba_threshold,
                    &extra,
                )?;
                nms(&mut detections, self.model.config().iou_threshold);
                Ok(detections)
            }
            ModelFamily::V10 => decode_end_to_end(
                output.view(),
                self.model.config().proba_threshold,
                &extra,
            ),
        }
    }

    fn infer(
        &mut self,
        input: <Yolo as Model>::Input,
        input_name: &str,
        output_name: &str,
    ) -> Result<<Yolo as Model>::Output, CropsightError> {
        let output = self
            .session
            .run(ort::inputs![
                input_name => TensorRef::from_array_view(&input).context(TensorSnafu{stage: "detect-input"})?
            ])
            .context(InferenceSnafu {})?;

        // Extract the output tensor and convert to ndarray
        let tensor = output
            .get(output_name)
            .context(NotFoundOutputSnafu { output_name })?
            .try_extract_array::<f32>()
            .context(TensorSnafu {
                stage: "detect-extract",
            })?;

        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return OutputLayoutSnafu {
                stage: "detect",
                shape,
            }
            .fail();
        }

        let output = tensor
            .to_shape([shape[0], shape[1], shape[2]])
            .context(ShapeSnafu { stage: "detect" })?
            .to_owned();

        Ok(output)
    }
}

fn to_source(bbox: Bbox, meta: &ImageMeta) -> Bbox {
    bbox.unletterbox(meta.offset, meta.scale)
        .clamp(Vec2::ZERO, meta.image_size)
}

/// Decodes a `[1, 4 + classes, anchors]` head: center/size boxes followed by per-class scores.
fn decode_anchor_grid(
    output: ArrayView3<f32>,
    cxywh_size: usize,
    proba_threshold: f32,
    meta: &ImageMeta,
) -> Result<Vec<Detection>, CropsightError> {
    if output.shape()[1] <= cxywh_size {
        return OutputLayoutSnafu {
            stage: "detect-v8",
            shape: output.shape().to_vec(),
        }
        .fail();
    }

    let mut detections = Vec::new();

    // Get the first batch slice (assuming batch size = 1)
    let output = output.slice(s![0, .., ..]);

    for prediction in output.axis_iter(Axis(1)) {
        let bbox = prediction.slice(s![0..cxywh_size]);
        let labels = prediction.slice(s![cxywh_size..]);

        // Find the class with the highest probability
        let Some((class_id, &proba)) = labels
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        else {
            continue;
        };

        // NaN scores fail the comparison and are dropped
        if !(proba >= proba_threshold) {
            continue;
        }

        let raw = Bbox::from_center_size(
            Vec2::new(bbox[0_usize], bbox[1_usize]),
            Vec2::new(bbox[2_usize], bbox[3_usize]),
        );
        detections.push(Detection::new(to_source(raw, meta), proba, class_id));
    }

    Ok(detections)
}

/// Decodes a `[1, detections, 6]` head of `x_min, y_min, x_max, y_max, score, class` rows.
fn decode_end_to_end(
    output: ArrayView3<f32>,
    proba_threshold: f32,
    meta: &ImageMeta,
) -> Result<Vec<Detection>, CropsightError> {
    if output.shape()[2] < XYXY_SCORE_CLASS_SIZE {
        return OutputLayoutSnafu {
            stage: "detect-v10",
            shape: output.shape().to_vec(),
        }
        .fail();
    }

    let rows = output.slice(s![0, .., ..]);
    let mut detections: Vec<Detection> = rows
        .axis_iter(Axis(0))
        .filter(|row| row[4_usize] >= proba_threshold)
        .map(|row| {
            let raw = Bbox::from_xyxy(row[0_usize], row[1_usize], row[2_usize], row[3_usize]);
            Detection::new(to_source(raw, meta), row[4_usize], row[5_usize].max(0.0) as usize)
        })
        .collect();

    detections.sort_by(|a, b| {
        b.proba
            .partial_cmp(&a.proba)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(detections)
}

/// Per-class Non-Maximum Suppression, highest confidence first.
fn nms(detections: &mut Vec<Detection>, iou_threshold: f32) {
    if detections.len() < 2 {
        return;
    }

    // Higher confidence detections will be processed first and have priority
    detections.sort_by(|a, b| {
        b.proba
            .partial_cmp(&a.proba)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep_flags = vec![true; detections.len()];

    for current_index in 0..detections.len() {
        if !keep_flags[current_index] {
            continue;
        }

        let current = detections[current_index];
        for (other_index, other) in detections.iter().enumerate().skip(current_index + 1) {
            if keep_flags[other_index]
                && other.class_id == current.class_id
                && current.bbox.iou(&other.bbox) > iou_threshold
            {
                keep_flags[other_index] = false;
            }
        }
    }

    let mut flags = keep_flags.into_iter();
    detections.retain(|_| flags.next().unwrap_or(false));
}
