use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CropsightError {
    #[snafu(display("Ort Session init stage `{}` error: {}", stage, source))]
    OrtInit {
        source: ort::error::Error,
        stage: String,
    },
    #[snafu(display("Build Tensor for `{}` error: {}", stage, source))]
    Tensor {
        source: ort::error::Error,
        stage: String,
    },
    #[snafu(display("Onnx Inference error: {}", source))]
    Inference { source: ort::error::Error },
    #[snafu(display("Onnx Output can not found {}", output_name))]
    NotFoundOutput { output_name: String },
    #[snafu(display("Onnx Output of `{}` has unexpected shape {:?}", stage, shape))]
    OutputLayout { stage: String, shape: Vec<usize> },
    #[snafu(display("Ndarray Shape error at stage `{}`: {}", stage, source))]
    Shape {
        source: ndarray::ShapeError,
        stage: String,
    },
    #[snafu(display("Load Font `{}` error: {}", path, source))]
    Font {
        source: ab_glyph::InvalidFont,
        path: String,
    },
    #[snafu(display("Image Read `{}` error: {}", path, source))]
    ImageRead {
        source: image::ImageError,
        path: String,
    },
    #[snafu(display("Image Write `{}` error: {}", path, source))]
    ImageWrite {
        source: image::ImageError,
        path: String,
    },
    #[snafu(display("Read `{}` error: {}", path, source))]
    IoRead {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Write `{}` error: {}", path, source))]
    IoWrite {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Dataset `{}` can not be listed: {}", path, source))]
    DatasetUnavailable {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid crop {}x{} at ({}, {})", width, height, left, top))]
    EmptyCrop {
        top: i32,
        left: i32,
        height: i32,
        width: i32,
    },
    #[snafu(display("Classifier returned no scores"))]
    EmptyScores,
    #[snafu(display("Background task `{}` failed: {}", stage, source))]
    Join {
        source: tokio::task::JoinError,
        stage: String,
    },
}
