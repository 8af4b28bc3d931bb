use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{api::ApiError, inference::detect::ModelFamily, pipeline::InferenceJob};

/// Body of `POST /inference`.
///
/// Loosely typed on the wire so every field can be rejected with its own
/// validation error; [`InferenceRequest::validate`] turns it into an
/// [`InferenceJob`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    #[serde(default)]
    pub job_id: Option<Value>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cam_det: Option<Value>,
    #[serde(default)]
    pub cam_cls: Option<Value>,
}

impl InferenceRequest {
    pub fn validate(&self) -> Result<InferenceJob, ApiError> {
        let job_id = match &self.job_id {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(ApiError::validation(
                    "jobId",
                    "jobId must be a non-empty string or a number",
                ));
            }
        };
        if !is_path_component(&job_id) {
            return Err(ApiError::validation(
                "jobId",
                "jobId must not contain path separators",
            ));
        }

        let user = path_component("user", self.user.as_deref())?;
        let dataset = path_component("name", self.name.as_deref())?;

        let family = self
            .model
            .as_deref()
            .and_then(ModelFamily::parse)
            .ok_or_else(|| {
                let expected: Vec<_> = ModelFamily::ALL.iter().map(|f| f.as_str()).collect();
                ApiError::validation(
                    "model",
                    format!("model must be one of {}", expected.join(", ")),
                )
            })?;

        Ok(InferenceJob {
            job_id,
            user,
            dataset,
            family,
            cam_detection: flag("camDet", self.cam_det.as_ref())?,
            cam_classification: flag("camCls", self.cam_cls.as_ref())?,
        })
    }
}

fn is_path_component(value: &str) -> bool {
    !value.is_empty() && value != "." && value != ".." && !value.contains(['/', '\\'])
}

fn path_component(field: &str, value: Option<&str>) -> Result<String, ApiError> {
    match value {
        Some(value) if is_path_component(value) => Ok(value.to_string()),
        Some(_) => Err(ApiError::validation(
            field,
            format!("{field} must be a single path component"),
        )),
        None => Err(ApiError::validation(field, format!("{field} is required"))),
    }
}

/// Absent flags are off.
fn flag(field: &str, value: Option<&Value>) -> Result<bool, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(text)) => match text.as_str() {
            "True" | "true" => Ok(true),
            "False" | "false" => Ok(false),
            _ => Err(ApiError::validation(
                field,
                format!("{field} must be true or false"),
            )),
        },
        Some(_) => Err(ApiError::validation(
            field,
            format!("{field} must be true or false"),
        )),
    }
}
