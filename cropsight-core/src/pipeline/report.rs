use serde::{Deserialize, Serialize};

/// One classified detection in a report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    #[serde(rename = "class")]
    pub class: String,
    /// Percentage of the probability rounded to two decimals, ties to even.
    pub prob: f64,
}

impl ClassScore {
    pub fn new(class: impl Into<String>, proba: f32) -> Self {
        Self {
            class: class.into(),
            prob: (proba as f64 * 100.0).round_ties_even(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CamLink {
    pub url: String,
}

/// Per-image entry of the inference response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageReport {
    pub image_name: String,
    pub num_detection: usize,
    pub results: Vec<ClassScore>,
    /// Detection overlay, empty when nothing was detected.
    pub url: String,
    /// `None` unless detection heatmaps were requested.
    pub url_cam_detection: Option<String>,
    /// `None` unless classification heatmaps were requested.
    pub url_cam_classification: Option<Vec<CamLink>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_score_percentage() {
        assert_eq!(ClassScore::new("ok", 0.874).prob, 87.0);
        assert_eq!(ClassScore::new("ok", 0.875).prob, 88.0);
        // exact binary ties go to the even percentage
        assert_eq!(ClassScore::new("ok", 0.125).prob, 12.0);
        assert_eq!(ClassScore::new("ok", 0.375).prob, 38.0);
        assert_eq!(ClassScore::new("ok", 1.0).prob, 100.0);
    }

    #[test]
    fn test_report_wire_format() {
        let report = ImageReport {
            image_name: "leaf".to_string(),
            num_detection: 1,
            results: vec![ClassScore::new("healthy", 0.5)],
            url: "http://host/static/a/detection.jpg".to_string(),
            url_cam_detection: None,
            url_cam_classification: Some(vec![CamLink {
                url: "http://host/static/a/classification/cam0.jpg".to_string(),
            }]),
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["image_name"], "leaf");
        assert_eq!(value["num_detection"], 1);
        assert_eq!(value["results"][0]["class"], "healthy");
        assert_eq!(value["results"][0]["prob"], 50.0);
        assert!(value["url_cam_detection"].is_null());
        assert_eq!(
            value["url_cam_classification"][0]["url"],
            "http://host/static/a/classification/cam0.jpg"
        );
    }
}
