//! Result Normalizer
//!
//! Maps the analysis service's snake_case records into `AnalysisResult`.
//! Pure mapping: ordering of issues, strengths and recommendations is kept
//! as received, and metrics fold into a name-keyed map where the last record
//! for a name wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use super::result::{AnalysisResult, Issue, Metric, MetricStatus, Severity};
use crate::core::{CoreError, CoreResult, Frame};

// =============================================================================
// Wire Types
// =============================================================================

/// Success body of `POST /api/analyze`
#[derive(Debug, Deserialize)]
pub struct RemoteAnalysis {
    pub overall_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<RemoteIssue>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metrics: Vec<RemoteMetric>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: Vec<RemoteRecommendation>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteIssue {
    pub issue_type: String,
    pub severity: Severity,
    pub frame_start: Frame,
    pub frame_end: Frame,
    #[serde(default)]
    pub coaching_cue: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoteMetric {
    pub metric_name: String,
    pub actual_value: MetricValue,
    pub target_value: MetricValue,
    pub status: MetricStatus,
}

#[derive(Debug, Deserialize)]
pub struct RemoteRecommendation {
    pub recommendation_text: String,
}

/// Metric values arrive as text ("92°") or bare numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Text(String),
    Number(serde_json::Number),
}

impl MetricValue {
    fn into_display(self) -> String {
        match self {
            MetricValue::Text(text) => text,
            MetricValue::Number(number) => number.to_string(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Normalization
// =============================================================================

/// Parses a success body. Unparsable or incomplete bodies are malformed.
pub fn parse_response(body: &[u8]) -> CoreResult<RemoteAnalysis> {
    serde_json::from_slice(body).map_err(|e| CoreError::MalformedResponse(e.to_string()))
}

/// Maps the service shape into the presentation shape
pub fn normalize(remote: RemoteAnalysis) -> AnalysisResult {
    let issues = remote
        .issues
        .into_iter()
        .map(|i| Issue::new(i.issue_type, i.severity, i.frame_start, i.frame_end, i.coaching_cue))
        .collect();

    let mut metrics = BTreeMap::new();
    for m in remote.metrics {
        metrics.insert(
            m.metric_name,
            Metric {
                actual: m.actual_value.into_display(),
                target: m.target_value.into_display(),
                status: m.status,
            },
        );
    }

    AnalysisResult {
        overall_score: remote.overall_score,
        issues,
        strengths: remote.strengths,
        metrics,
        recommendations: remote
            .recommendations
            .into_iter()
            .map(|r| r.recommendation_text)
            .collect(),
    }
}

/// Parses and normalizes a success body
pub fn normalize_body(body: &[u8]) -> CoreResult<AnalysisResult> {
    parse_response(body).map(normalize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_fields_are_renamed() {
        let body = br#"{
            "overall_score": 7.5,
            "issues": [{"issue_type":"knee_valgus","severity":"moderate","frame_start":30,"frame_end":45,"coaching_cue":"push knees out"}],
            "strengths": [],
            "metrics": [],
            "recommendations": []
        }"#;
        let result = normalize_body(body).unwrap();

        assert_eq!(result.issues.len(), 1);
        let issue = &result.issues[0];
        assert_eq!(issue.issue_type, "knee_valgus");
        assert_eq!(issue.severity, Severity::Moderate);
        assert_eq!(issue.frame_start, 30);
        assert_eq!(issue.frame_end, 45);
        assert_eq!(issue.cue, "push knees out");
    }

    #[test]
    fn test_duplicate_metric_names_last_write_wins() {
        let body = r#"{
            "overall_score": 6,
            "metrics": [
                {"metric_name":"kneeAngle","actual_value":"85°","target_value":"90°","status":"warning"},
                {"metric_name":"depth","actual_value":0.8,"target_value":1,"status":"good"},
                {"metric_name":"kneeAngle","actual_value":"92°","target_value":"90°","status":"good"}
            ]
        }"#;
        let result = normalize_body(body.as_bytes()).unwrap();

        assert_eq!(result.metrics.len(), 2);
        let knee = &result.metrics["kneeAngle"];
        assert_eq!(knee.actual, "92°");
        assert_eq!(knee.status, MetricStatus::Good);
        assert_eq!(result.metrics["depth"].actual, "0.8");
    }

    #[test]
    fn test_ordering_is_preserved() {
        let body = br#"{
            "overall_score": 8.2,
            "issues": [
                {"issue_type":"b","severity":"minor","frame_start":90,"frame_end":100,"coaching_cue":"second"},
                {"issue_type":"a","severity":"severe","frame_start":10,"frame_end":20,"coaching_cue":"first"}
            ],
            "strengths": ["z stance", "a tempo"],
            "recommendations": [{"recommendation_text":"slow down"},{"recommendation_text":"add mobility"}]
        }"#;
        let result = normalize_body(body).unwrap();

        let types: Vec<&str> = result.issues.iter().map(|i| i.issue_type.as_str()).collect();
        assert_eq!(types, vec!["b", "a"]);
        assert_eq!(result.strengths, vec!["z stance", "a tempo"]);
        assert_eq!(result.recommendations, vec!["slow down", "add mobility"]);
    }

    #[test]
    fn test_absent_or_null_sequences_default_to_empty() {
        let result = normalize_body(br#"{"overall_score": 9, "issues": null}"#).unwrap();
        assert!(result.issues.is_empty());
        assert!(result.strengths.is_empty());
        assert!(result.metrics.is_empty());
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_inverted_frame_range_is_reordered() {
        let body = br#"{"overall_score": 5, "issues": [{"issue_type":"x","severity":"minor","frame_start":50,"frame_end":40,"coaching_cue":"c"}]}"#;
        let result = normalize_body(body).unwrap();
        assert_eq!(result.issues[0].frame_start, 40);
        assert_eq!(result.issues[0].frame_end, 50);
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(matches!(
            normalize_body(b"<html>oops</html>"),
            Err(CoreError::MalformedResponse(_))
        ));
        assert!(matches!(
            normalize_body(br#"{"issues": []}"#),
            Err(CoreError::MalformedResponse(_))
        ));
        assert!(matches!(
            normalize_body(br#"{"overall_score": 5, "issues": [{"issue_type":"x","severity":"catastrophic","frame_start":1,"frame_end":2}]}"#),
            Err(CoreError::MalformedResponse(_))
        ));
    }
}
