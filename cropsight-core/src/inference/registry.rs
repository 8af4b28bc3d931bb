use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use snafu::ResultExt;
use tokio::sync::{Mutex, OnceCell};
use tracing::info;

use crate::{
    error::{CropsightError, JoinSnafu},
    inference::{
        classify::{ClsSession, YoloCls},
        detect::{ModelFamily, Yolo, YoloSession},
        model::{Model, session_builder},
    },
};

pub type SharedDetector = Arc<Mutex<YoloSession<Yolo>>>;
pub type SharedClassifier = Arc<Mutex<ClsSession<YoloCls>>>;

/// Lazily loaded model sessions, one per detector family plus the classifier.
///
/// Each session is committed on first use and kept for the life of the
/// registry. Concurrent first uses wait on the same load.
pub struct ModelRegistry {
    models_dir: PathBuf,
    v8: OnceCell<SharedDetector>,
    v10: OnceCell<SharedDetector>,
    classifier: OnceCell<SharedClassifier>,
}

impl ModelRegistry {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            v8: OnceCell::new(),
            v10: OnceCell::new(),
            classifier: OnceCell::new(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    fn slot(&self, family: ModelFamily) -> &OnceCell<SharedDetector> {
        match family {
            ModelFamily::V8 => &self.v8,
            ModelFamily::V10 => &self.v10,
        }
    }

    pub fn is_loaded(&self, family: ModelFamily) -> bool {
        self.slot(family).initialized()
    }

    pub async fn detector(&self, family: ModelFamily) -> Result<SharedDetector, CropsightError> {
        let models_dir = self.models_dir.clone();
        let detector = self
            .slot(family)
            .get_or_try_init(|| async move {
                let session = tokio::task::spawn_blocking(move || {
                    let model = Yolo::new(family, &models_dir);
                    info!(family = %family, path = %model.path().display(), "loading detector");
                    YoloSession::new(session_builder()?, model)
                })
                .await
                .context(JoinSnafu {
                    stage: "load-detector",
                })??;
                Ok::<_, CropsightError>(Arc::new(Mutex::new(session)))
            })
            .await?;

        Ok(detector.clone())
    }

    pub async fn classifier(&self) -> Result<SharedClassifier, CropsightError> {
        let models_dir = self.models_dir.clone();
        let classifier = self
            .classifier
            .get_or_try_init(|| async move {
                let session = tokio::task::spawn_blocking(move || {
                    let model = YoloCls::new(&models_dir);
                    info!(path = %model.path().display(), "loading classifier");
                    ClsSession::new(session_builder()?, model)
                })
                .await
                .context(JoinSnafu {
                    stage: "load-classifier",
                })??;
                Ok::<_, CropsightError>(Arc::new(Mutex::new(session)))
            })
            .await?;

        Ok(classifier.clone())
    }
}
