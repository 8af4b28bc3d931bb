use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use super::{ApiError, InferenceRequest};
use crate::{
    error::CropsightError,
    inference::registry::ModelRegistry,
    pipeline::{BatchRunner, ImageReport},
};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub runner: Arc<BatchRunner>,
}

impl AppState {
    pub fn new(registry: ModelRegistry, runner: BatchRunner) -> Self {
        Self {
            registry: Arc::new(registry),
            runner: Arc::new(runner),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let static_root = state.runner.settings().static_root.clone();

    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Batch inference over a dataset directory
        .route("/inference", post(inference_handler))
        // Overlays and heatmaps written by the batch runner
        .nest_service("/static", ServeDir::new(static_root))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(bind: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// POST /inference - detect and classify every image of a dataset
///
/// # Errors
/// - 400 Bad Request: malformed body or a field failing validation
/// - 404 Not Found: dataset directory can not be listed
/// - 503 Service Unavailable: detector or classifier weights can not be loaded
/// - 500 Internal Server Error: any failure while processing an image
async fn inference_handler(
    State(state): State<AppState>,
    payload: Result<Json<InferenceRequest>, JsonRejection>,
) -> Result<Json<Vec<ImageReport>>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected inference body: {}", rejection.body_text());
        ApiError::InvalidRequest(rejection.body_text())
    })?;
    let job = request.validate().inspect_err(|e| warn!("{}", e))?;

    // listing first so a missing dataset never waits on model loading
    let runner = state.runner.clone();
    let listed_job = job.clone();
    let images = tokio::task::spawn_blocking(move || runner.list_images(&listed_job))
        .await
        .map_err(|e| ApiError::InternalError(format!("Dataset listing failed: {}", e)))??;

    let detector = state
        .registry
        .detector(job.family)
        .await
        .map_err(model_unavailable)?;
    let classifier = state
        .registry
        .classifier()
        .await
        .map_err(model_unavailable)?;

    let runner = state.runner.clone();
    let reports = tokio::task::spawn_blocking(move || {
        let mut detector = detector.blocking_lock();
        let mut classifier = classifier.blocking_lock();
        runner.run(&job, &images, &mut *detector, &mut *classifier)
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("Batch task failed: {}", e)))??;

    Ok(Json(reports))
}

fn model_unavailable(err: CropsightError) -> ApiError {
    warn!("Model not available: {}", err);
    ApiError::ServiceUnavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        analysis::crop::CropPolicy,
        pipeline::BatchSettings,
    };

    fn app(root: &Path) -> Router {
        let runner = BatchRunner::new(BatchSettings {
            dataset_root: root.join("datasets"),
            static_root: root.join("static"),
            public_url: "http://127.0.0.1:5000".to_string(),
            crop_policy: CropPolicy::default(),
        });
        router(AppState::new(ModelRegistry::new(root.join("models")), runner))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_inference(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/inference")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app(dir.path()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_unknown_model_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let request = post_inference(json!({
            "jobId": 1, "user": "alice", "name": "plants",
            "model": "v9", "camDet": false, "camCls": false
        }));

        let (status, body) = send(app(dir.path()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_type"], "validation_error");
        assert_eq!(body["details"]["field"], "model");
    }

    #[tokio::test]
    async fn test_non_boolean_flag_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let request = post_inference(json!({
            "jobId": 1, "user": "alice", "name": "plants",
            "model": "v8", "camDet": "os.system('ls')", "camCls": false
        }));

        let (status, body) = send(app(dir.path()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "camDet");
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/inference")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(app(dir.path()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_type"], "invalid_request");
    }

    #[tokio::test]
    async fn test_missing_dataset_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let request = post_inference(json!({
            "jobId": "j1", "user": "alice", "name": "nowhere",
            "model": "v8", "camDet": "False", "camCls": "False"
        }));

        let (status, body) = send(app(dir.path()), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_type"], "dataset_unavailable");
    }

    #[tokio::test]
    async fn test_missing_weights_are_service_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("datasets/alice/plants")).unwrap();
        let request = post_inference(json!({
            "jobId": "j1", "user": "alice", "name": "plants",
            "model": "v10", "camDet": false, "camCls": false
        }));

        let (status, body) = send(app(dir.path()), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error_type"], "service_unavailable");
    }

    #[tokio::test]
    async fn test_static_files_are_served() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("static/alice/inference 1 - plants/leaf");
        std::fs::create_dir_all(&image_dir).unwrap();
        std::fs::write(image_dir.join("detection.jpg"), b"jpeg").unwrap();

        let request = Request::builder()
            .uri("/static/alice/inference%201%20-%20plants/leaf/detection.jpg")
            .body(Body::empty())
            .unwrap();
        let response = app(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"jpeg");
    }
}
