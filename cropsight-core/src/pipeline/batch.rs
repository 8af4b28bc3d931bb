use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ab_glyph::FontArc;
use image::{DynamicImage, ImageFormat};
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    analysis::{
        bbox::Bbox,
        crop::{CropPolicy, CropRegion},
        mask::{chw_to_image, obscure_non_intersection},
    },
    consts::{CAM_DETECTION_IMAGE, CLASSIFICATION_DIR, DETECTION_IMAGE},
    error::*,
    inference::detect::ModelFamily,
    pipeline::{
        CamRenderer, Classify, Detect,
        report::{CamLink, ClassScore, ImageReport},
    },
    render,
};

/// A validated inference request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferenceJob {
    pub job_id: String,
    pub user: String,
    pub dataset: String,
    pub family: ModelFamily,
    pub cam_detection: bool,
    pub cam_classification: bool,
}

impl InferenceJob {
    /// Directory that groups every image of this job under the user's static folder.
    pub fn result_dir_name(&self) -> String {
        format!("inference {} - {}", self.job_id, self.dataset)
    }
}

#[derive(Clone, Debug)]
pub struct BatchSettings {
    /// Datasets live at `<dataset_root>/<user>/<dataset>`.
    pub dataset_root: PathBuf,
    /// Artefacts are written under `<static_root>/<user>/<job dir>/<image>`.
    pub static_root: PathBuf,
    /// Base URL the static root is served from, without the `/static` suffix.
    pub public_url: String,
    pub crop_policy: CropPolicy,
}

/// Runs a dataset through detection, neighbour obscuring, cropping and classification.
pub struct BatchRunner {
    settings: BatchSettings,
    font: Option<FontArc>,
    cam: Option<Arc<dyn CamRenderer>>,
}

impl BatchRunner {
    pub fn new(settings: BatchSettings) -> Self {
        Self {
            settings,
            font: None,
            cam: None,
        }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_cam(mut self, cam: Arc<dyn CamRenderer>) -> Self {
        self.cam = Some(cam);
        self
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    pub fn dataset_dir(&self, job: &InferenceJob) -> PathBuf {
        self.settings.dataset_root.join(&job.user).join(&job.dataset)
    }

    fn image_dir(&self, job: &InferenceJob, image_name: &str) -> PathBuf {
        self.settings
            .static_root
            .join(&job.user)
            .join(job.result_dir_name())
            .join(image_name)
    }

    /// Public URL of an artefact, every path component percent-encoded.
    pub fn artefact_url(&self, job: &InferenceJob, image_name: &str, file: &[&str]) -> String {
        let result_dir = job.result_dir_name();
        let segments: Vec<String> = [job.user.as_str(), result_dir.as_str(), image_name]
            .iter()
            .chain(file.iter())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();

        format!(
            "{}/static/{}",
            self.settings.public_url.trim_end_matches('/'),
            segments.join("/")
        )
    }

    /// Lists the images of a dataset in file name order.
    ///
    /// Subdirectories and files without a known image extension are skipped.
    pub fn list_images(&self, job: &InferenceJob) -> Result<Vec<PathBuf>, CropsightError> {
        let dataset_dir = self.dataset_dir(job);
        let entries = std::fs::read_dir(&dataset_dir).context(DatasetUnavailableSnafu {
            path: dataset_dir.to_string_lossy(),
        })?;

        let mut images = Vec::new();
        for entry in entries {
            let path = entry
                .context(DatasetUnavailableSnafu {
                    path: dataset_dir.to_string_lossy(),
                })?
                .path();
            if !path.is_file() {
                continue;
            }
            if ImageFormat::from_path(&path).is_err() {
                debug!(path = %path.display(), "skipping non-image file");
                continue;
            }
            images.push(path);
        }

        images.sort();
        Ok(images)
    }

    /// Lists the dataset then runs every image through the models.
    pub fn run_dataset<D, C>(
        &self,
        job: &InferenceJob,
        detector: &mut D,
        classifier: &mut C,
    ) -> Result<Vec<ImageReport>, CropsightError>
    where
        D: Detect + ?Sized,
        C: Classify + ?Sized,
    {
        let images = self.list_images(job)?;
        self.run(job, &images, detector, classifier)
    }

    /// Processes images serially; the first failure aborts the whole batch.
    pub fn run<D, C>(
        &self,
        job: &InferenceJob,
        images: &[PathBuf],
        detector: &mut D,
        classifier: &mut C,
    ) -> Result<Vec<ImageReport>, CropsightError>
    where
        D: Detect + ?Sized,
        C: Classify + ?Sized,
    {
        info!(
            job = %job.job_id,
            user = %job.user,
            dataset = %job.dataset,
            family = %job.family,
            images = images.len(),
            "starting batch"
        );

        if (job.cam_detection || job.cam_classification) && self.cam.is_none() {
            warn!("activation maps requested but no renderer is configured");
        }

        images
            .iter()
            .map(|path| self.process_image(job, path, detector, classifier))
            .collect()
    }

    fn process_image<D, C>(
        &self,
        job: &InferenceJob,
        path: &Path,
        detector: &mut D,
        classifier: &mut C,
    ) -> Result<ImageReport, CropsightError>
    where
        D: Detect + ?Sized,
        C: Classify + ?Sized,
    {
        let image_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result_dir = self.image_dir(job, &image_name);
        std::fs::create_dir_all(&result_dir).context(IoWriteSnafu {
            path: result_dir.to_string_lossy(),
        })?;

        let image = image::open(path).context(ImageReadSnafu {
            path: path.to_string_lossy(),
        })?;

        let detections = detector.detect(&image)?;
        let num_detection = detections.len();
        info!(image = %image_name, detections = num_detection, "detected");

        let mut url_cam_detection = String::new();
        if job.cam_detection && num_detection > 0 {
            if let Some(heatmap) = self.detection_cam(path, job.family)? {
                render::save(&heatmap, &result_dir.join(CAM_DETECTION_IMAGE))?;
                url_cam_detection = self.artefact_url(job, &image_name, &[CAM_DETECTION_IMAGE]);
            }
        }

        let source = image.to_rgb8();
        let (image_width, image_height) = source.dimensions();
        let boxes: Vec<Bbox> = detections.iter().map(|d| d.bbox).collect();

        let mut overlay = source.clone();
        let mut results = Vec::with_capacity(num_detection);
        let mut cam_links = Vec::new();

        for (index, detection) in detections.iter().enumerate() {
            // fresh copy so obscuring never compounds across detections
            let mut frame = source.clone();
            let tensor = obscure_non_intersection(&mut frame, &boxes, index, &detection.center);

            let region = CropRegion::plan(
                &detection.bbox,
                &detection.center,
                image_width,
                image_height,
                &self.settings.crop_policy,
            );
            let crop = DynamicImage::ImageRgb8(chw_to_image(region.crop_chw(&tensor)?));
            debug!(index, ?region, "classifying crop");

            let classification = classifier.classify(&crop)?;

            if job.cam_classification {
                if let Some(cam) = self.cam.as_deref() {
                    let classification_dir = result_dir.join(CLASSIFICATION_DIR);
                    std::fs::create_dir_all(&classification_dir).context(IoWriteSnafu {
                        path: classification_dir.to_string_lossy(),
                    })?;

                    let file = format!("cam{index}.jpg");
                    let heatmap = cam.classification(&crop)?;
                    render::save(&heatmap, &classification_dir.join(&file))?;
                    cam_links.push(CamLink {
                        url: self.artefact_url(job, &image_name, &[CLASSIFICATION_DIR, &file]),
                    });
                }
            }

            render::draw_detection(
                &mut overlay,
                detection,
                &classification,
                self.font.as_ref(),
            );
            results.push(ClassScore::new(classification.label, classification.proba));
        }

        let url = if num_detection > 0 {
            render::save(&overlay, &result_dir.join(DETECTION_IMAGE))?;
            self.artefact_url(job, &image_name, &[DETECTION_IMAGE])
        } else {
            String::new()
        };

        Ok(ImageReport {
            image_name,
            num_detection,
            results,
            url,
            url_cam_detection: job.cam_detection.then_some(url_cam_detection),
            url_cam_classification: job.cam_classification.then_some(cam_links),
        })
    }

    fn detection_cam(
        &self,
        path: &Path,
        family: ModelFamily,
    ) -> Result<Option<image::RgbImage>, CropsightError> {
        match self.cam.as_deref() {
            Some(cam) => cam.detection(path, family),
            None => Ok(None),
        }
    }
}
