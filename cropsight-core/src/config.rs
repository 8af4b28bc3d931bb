use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser};
use tracing::info;

use crate::{
    analysis::crop::{CropBasis, CropPolicy},
    consts::CROP_CONTEXT_SCALE,
    error::CropsightError,
    inference::{detect::ModelFamily, registry::ModelRegistry},
    pipeline::{BatchRunner, BatchSettings, InferenceJob},
    render,
};

/// Locations and rendering options shared by the server and the offline runner.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[arg(
        long,
        env = "CROPSIGHT_DATASET_ROOT",
        default_value = "/usr/app/Datasets",
        help = "Root holding <user>/<dataset> image directories"
    )]
    pub dataset_root: PathBuf,

    #[arg(
        long,
        env = "CROPSIGHT_STATIC_ROOT",
        default_value = "static",
        help = "Directory receiving overlays and heatmaps"
    )]
    pub static_root: PathBuf,

    #[arg(
        long,
        env = "CROPSIGHT_MODELS_DIR",
        default_value = "models",
        help = "Directory holding detect/ and classification/ ONNX weights"
    )]
    pub models_dir: PathBuf,

    #[arg(
        long,
        env = "CROPSIGHT_PUBLIC_URL",
        default_value = "http://127.0.0.1:5000",
        help = "Base URL the static directory is reachable under"
    )]
    pub public_url: String,

    #[arg(long, env = "CROPSIGHT_FONT", help = "TrueType font for overlay captions")]
    pub font: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        env = "CROPSIGHT_CROP_BASIS",
        default_value = "height",
        help = "Detection extent that sizes the classifier crop"
    )]
    pub crop_basis: CropBasis,
}

impl PipelineArgs {
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            dataset_root: self.dataset_root.clone(),
            static_root: self.static_root.clone(),
            public_url: self.public_url.clone(),
            crop_policy: CropPolicy {
                basis: self.crop_basis,
                scale: CROP_CONTEXT_SCALE,
            },
        }
    }

    pub fn runner(&self) -> Result<BatchRunner, CropsightError> {
        let runner = BatchRunner::new(self.batch_settings());
        match &self.font {
            Some(path) => {
                info!(font = %path.display(), "loading caption font");
                Ok(runner.with_font(render::load_font(path)?))
            }
            None => Ok(runner),
        }
    }

    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::new(&self.models_dir)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "serve")]
#[command(about = "Detection and crop classification service")]
pub struct ServerConfig {
    #[arg(
        long,
        env = "CROPSIGHT_BIND",
        default_value = "0.0.0.0:5000",
        help = "Socket address to listen on"
    )]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "batch")]
#[command(about = "Run one dataset through the pipeline and print the JSON report")]
pub struct BatchArgs {
    #[arg(short, long, help = "Dataset owner")]
    pub user: String,

    #[arg(short, long, help = "Dataset directory name")]
    pub name: String,

    #[arg(short, long, value_enum, default_value = "v8", help = "Detector family")]
    pub model: ModelFamily,

    #[arg(long, default_value = "local", help = "Job id used in the output directory")]
    pub job_id: String,

    #[arg(long, help = "Pretty-print the report")]
    pub pretty: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl BatchArgs {
    pub fn job(&self) -> InferenceJob {
        InferenceJob {
            job_id: self.job_id.clone(),
            user: self.user.clone(),
            dataset: self.name.clone(),
            family: self.model,
            cam_detection: false,
            cam_classification: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::try_parse_from(["serve"]).unwrap();
        assert_eq!(config.bind.port(), 5000);
        assert_eq!(config.pipeline.crop_basis, CropBasis::Height);
        assert!(config.pipeline.font.is_none());

        let settings = config.pipeline.batch_settings();
        assert_eq!(settings.crop_policy, CropPolicy::default());
    }

    #[test]
    fn test_server_overrides() {
        let config = ServerConfig::try_parse_from([
            "serve",
            "--bind",
            "127.0.0.1:8080",
            "--dataset-root",
            "/data",
            "--crop-basis",
            "longest-side",
        ])
        .unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.pipeline.dataset_root, PathBuf::from("/data"));
        assert_eq!(config.pipeline.crop_basis, CropBasis::LongestSide);
    }

    #[test]
    fn test_batch_args_build_job() {
        let args = BatchArgs::try_parse_from([
            "batch", "--user", "alice", "--name", "plants", "--model", "v10",
        ])
        .unwrap();

        let job = args.job();
        assert_eq!(job.family, ModelFamily::V10);
        assert_eq!(job.result_dir_name(), "inference local - plants");
        assert!(!job.cam_detection);
    }

    #[test]
    fn test_unknown_family_is_rejected() {
        assert!(
            BatchArgs::try_parse_from(["batch", "-u", "a", "-n", "b", "-m", "v5"]).is_err()
        );
    }
}
