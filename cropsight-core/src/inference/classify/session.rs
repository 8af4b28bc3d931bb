use std::{collections::HashMap, time::Instant};

use image::{DynamicImage, imageops::FilterType};
use ndarray::prelude::*;
use ort::{
    session::{Session, builder::SessionBuilder},
    value::TensorRef,
};
use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::{
    detection::Classification,
    error::*,
    inference::{
        classify::model::{YoloCls, YoloClsConfig},
        model::{Model, OnnxSession, commit},
    },
};

pub struct ClsSession<M: Model> {
    session: Session,
    model: M,
    names: HashMap<usize, String>,
}

impl ClsSession<YoloCls> {
    pub fn new(session: SessionBuilder, model: YoloCls) -> Result<Self, CropsightError> {
        let session = commit(session, &model)?;

        // Label names ride along in the exported model metadata
        let names = session
            .metadata()
            .ok()
            .and_then(|m| m.custom("names").ok().flatten())
            .map(|raw| parse_names(&raw))
            .unwrap_or_default();
        debug!(labels = names.len(), "classifier labels loaded");

        Ok(Self {
            session,
            model,
            names,
        })
    }

    /// Classifies one crop.
    pub fn classify(&mut self, image: &DynamicImage) -> Result<Classification, CropsightError> {
        let start = Instant::now();
        let classification = self.run(image, ())?;
        debug!(
            label = %classification.label,
            proba = classification.proba,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "classifier finished"
        );
        Ok(classification)
    }
}

impl OnnxSession<YoloCls> for ClsSession<YoloCls> {
    type Output = Classification;
    type Extra = ();

    fn preprocess(
        &self,
        image: &DynamicImage,
    ) -> Result<<YoloCls as Model>::Input, CropsightError> {
        Ok(classify_input(image, self.model.config()))
    }

    fn postprocess(
        &self,
        output: <YoloCls as Model>::Output,
        _extra: Self::Extra,
    ) -> Result<Self::Output, CropsightError> {
        let scores: Vec<f32> = output.slice(s![0, ..]).to_vec();
        let probabilities = to_probabilities(scores, self.model.config().probability_tolerance);

        let (label_id, &proba) = probabilities
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .context(EmptyScoresSnafu)?;

        let label = label_for(&self.names, label_id);

        Ok(Classification {
            label_id,
            label,
            proba,
        })
    }

    fn infer(
        &mut self,
        input: <YoloCls as Model>::Input,
        input_name: &str,
        output_name: &str,
    ) -> Result<<YoloCls as Model>::Output, CropsightError> {
        let output = self
            .session
            .run(ort::inputs![
                input_name => TensorRef::from_array_view(&input).context(TensorSnafu{stage: "classify-input"})?
            ])
            .context(InferenceSnafu {})?;

        let tensor = output
            .get(output_name)
            .context(NotFoundOutputSnafu { output_name })?
            .try_extract_array::<f32>()
            .context(TensorSnafu {
                stage: "classify-extract",
            })?;

        // Reshape to [batch_size, classes]
        let shape = tensor.shape().to_vec();
        if shape.len() < 2 {
            return OutputLayoutSnafu {
                stage: "classify",
                shape,
            }
            .fail();
        }
        let classes = shape[1..].iter().product::<usize>();

        let output = tensor
            .to_shape([shape[0], classes])
            .context(ShapeSnafu { stage: "classify" })?
            .to_owned();

        Ok(output)
    }
}

/// Shorter side resized to the model size, then center-cropped, RGB in `[0, 1]`.
pub fn classify_input(image: &DynamicImage, config: &YoloClsConfig) -> Array4<f32> {
    let size = config.required_size as u32;
    let src = image.to_rgb8();
    let (w0, h0) = src.dimensions();

    let scale = size as f32 / w0.min(h0).max(1) as f32;
    let w_new = ((w0 as f32 * scale).round() as u32).max(size);
    let h_new = ((h0 as f32 * scale).round() as u32).max(size);
    let resized = image::imageops::resize(&src, w_new, h_new, FilterType::Triangle);

    let left = (w_new - size) / 2;
    let top = (h_new - size) / 2;
    let cropped = image::imageops::crop_imm(&resized, left, top, size, size).to_image();

    let mut input_tensor = Array4::zeros([
        config.batch_size,
        config.input_channels,
        config.required_size,
        config.required_size,
    ]);

    for (x, y, pixel) in cropped.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input_tensor[[0, 0, y, x]] = r as f32 / 255.0;
        input_tensor[[0, 1, y, x]] = g as f32 / 255.0;
        input_tensor[[0, 2, y, x]] = b as f32 / 255.0;
    }

    input_tensor
}

/// Passes through scores that already form a distribution, softmaxes anything else.
pub fn to_probabilities(scores: Vec<f32>, tolerance: f32) -> Vec<f32> {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    if scores.is_empty() || (in_range && (sum - 1.0).abs() <= tolerance) {
        return scores;
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / total).collect()
}

/// Name of a class index, `class<i>` when the metadata does not list it.
pub fn label_for(names: &HashMap<usize, String>, label_id: usize) -> String {
    names
        .get(&label_id)
        .cloned()
        .unwrap_or_else(|| format!("class{label_id}"))
}

/// Parses exported label metadata such as `{0: 'cat', 1: "dog's toy"}`.
///
/// Names are keyed by their numeric index; lookups for indices without an
/// entry fall back to `class<i>`.
pub fn parse_names(raw: &str) -> HashMap<usize, String> {
    let body = raw.trim().trim_start_matches('{').trim_end_matches('}');
    let mut names = HashMap::new();
    let mut rest = body;

    while let Some(colon) = rest.find(':') {
        let Ok(index) = rest[..colon]
            .trim()
            .trim_start_matches(',')
            .trim()
            .parse::<usize>()
        else {
            break;
        };

        let value = rest[colon + 1..].trim_start();
        let Some(quote) = value.chars().next().filter(|c| *c == '\'' || *c == '"') else {
            break;
        };
        let Some(end) = value[1..].find(quote) else {
            break;
        };

        names.insert(index, value[1..1 + end].to_string());
        rest = &value[1 + end + 1..];
    }

    names
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    #[test]
    fn test_parse_names() {
        let names = parse_names("{0: 'healthy', 1: 'diseased'}");
        assert_eq!(names.len(), 2);
        assert_eq!(names[&0], "healthy");
        assert_eq!(names[&1], "diseased");

        let names = parse_names(r#"{0: "dog's toy", 1: 'a, b'}"#);
        assert_eq!(names[&0], "dog's toy");
        assert_eq!(names[&1], "a, b");

        let names = parse_names("{1: 'second'}");
        assert_eq!(names.len(), 1);
        assert!(!names.contains_key(&0));

        assert!(parse_names("").is_empty());
        assert!(parse_names("not a dict").is_empty());
    }

    #[test]
    fn test_parse_names_sparse_large_index() {
        let names = parse_names("{99999999999: 'far', 2: 'near'}");
        assert_eq!(names.len(), 2);
        assert_eq!(names[&99999999999], "far");
        assert_eq!(names[&2], "near");

        assert_eq!(label_for(&names, 2), "near");
        assert_eq!(label_for(&names, 0), "class0");
    }

    #[test]
    fn test_probabilities_pass_through() {
        let scores = vec![0.1, 0.7, 0.2];
        assert_eq!(to_probabilities(scores.clone(), 1e-3), scores);
    }

    #[test]
    fn test_probabilities_softmax_logits() {
        let probabilities = to_probabilities(vec![2.0, 1.0, -1.0], 1e-3);
        let sum: f32 = probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probabilities[0] > probabilities[1]);
        assert!(probabilities[1] > probabilities[2]);
    }

    #[test]
    fn test_classify_input_center_crops() {
        let config = YoloClsConfig {
            required_size: 8,
            ..YoloClsConfig::default()
        };
        // 32x16: shorter side -> 8, width -> 16, keep the middle 8 columns
        let image = RgbImage::from_fn(32, 16, |x, _| {
            if (8..24).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });

        let tensor = classify_input(&DynamicImage::ImageRgb8(image), &config);
        assert_eq!(tensor.dim(), (1, 3, 8, 8));
        assert!(tensor.slice(s![0, .., .., 1..7]).iter().all(|v| *v > 0.9));
    }

    #[test]
    fn test_classify_input_upscales_small_crops() {
        let config = YoloClsConfig {
            required_size: 16,
            ..YoloClsConfig::default()
        };
        let image = RgbImage::from_pixel(3, 5, Rgb([255, 0, 0]));
        let tensor = classify_input(&DynamicImage::ImageRgb8(image), &config);
        assert_eq!(tensor.dim(), (1, 3, 16, 16));
        assert!(tensor.slice(s![0, 0, .., ..]).iter().all(|v| *v > 0.99));
        assert!(tensor.slice(s![0, 1, .., ..]).iter().all(|v| *v < 0.01));
    }
}
