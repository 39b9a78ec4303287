//! Normalized analysis result consumed by the presentation layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::Frame;

/// Frame rate assumed when placing issue markers on the timeline
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Issue severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Severe,
    Moderate,
    Minor,
}

/// Metric status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Good,
    Warning,
    Error,
}

/// A detected form issue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Issue type, e.g. `knee_valgus`
    #[serde(rename = "type")]
    pub issue_type: String,
    pub severity: Severity,
    /// First frame, never after `frame_end`
    pub frame_start: Frame,
    pub frame_end: Frame,
    /// Coaching cue text
    pub cue: String,
}

impl Issue {
    /// Builds an issue, reordering an inverted frame range
    pub fn new(
        issue_type: impl Into<String>,
        severity: Severity,
        frame_a: Frame,
        frame_b: Frame,
        cue: impl Into<String>,
    ) -> Self {
        Self {
            issue_type: issue_type.into(),
            severity,
            frame_start: frame_a.min(frame_b),
            frame_end: frame_a.max(frame_b),
            cue: cue.into(),
        }
    }
}

/// A measured metric against its target
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub actual: String,
    pub target: String,
    pub status: MetricStatus,
}

/// Normalized outcome of a remote analysis
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Overall score, expected in 0..=10
    pub overall_score: f64,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Metric>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Coarse grade of the overall score
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreGrade {
    Good,
    Warning,
    NeedsWork,
}

impl ScoreGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            ScoreGrade::Good
        } else if score >= 6.0 {
            ScoreGrade::Warning
        } else {
            ScoreGrade::NeedsWork
        }
    }
}

/// Timeline marker for an issue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueMarker {
    pub time_sec: f64,
    pub severity: Severity,
}

impl AnalysisResult {
    pub fn grade(&self) -> ScoreGrade {
        ScoreGrade::from_score(self.overall_score)
    }

    /// Score as a 0..=100 fill ratio for a progress bar
    pub fn score_percent(&self) -> f64 {
        if !self.overall_score.is_finite() {
            return 0.0;
        }
        (self.overall_score * 10.0).clamp(0.0, 100.0)
    }

    /// One marker per issue at its first frame
    pub fn markers(&self, frame_rate: u32) -> Vec<IssueMarker> {
        let fps = f64::from(frame_rate.max(1));
        self.issues
            .iter()
            .map(|issue| IssueMarker {
                time_sec: f64::from(issue.frame_start) / fps,
                severity: issue.severity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(ScoreGrade::from_score(8.0), ScoreGrade::Good);
        assert_eq!(ScoreGrade::from_score(7.9), ScoreGrade::Warning);
        assert_eq!(ScoreGrade::from_score(6.0), ScoreGrade::Warning);
        assert_eq!(ScoreGrade::from_score(5.5), ScoreGrade::NeedsWork);
    }

    #[test]
    fn test_markers_use_frame_rate() {
        let result = AnalysisResult {
            overall_score: 7.0,
            issues: vec![Issue::new("knee_valgus", Severity::Moderate, 30, 45, "push knees out")],
            ..Default::default()
        };
        let markers = result.markers(DEFAULT_FRAME_RATE);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].time_sec, 1.0);
        assert_eq!(markers[0].severity, Severity::Moderate);
    }

    #[test]
    fn test_issue_serializes_with_presentation_names() {
        let issue = Issue::new("knee_valgus", Severity::Minor, 45, 30, "cue");
        assert_eq!(issue.frame_start, 30);
        assert_eq!(issue.frame_end, 45);

        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "knee_valgus");
        assert_eq!(json["frameStart"], 30);
        assert_eq!(json["severity"], "minor");
    }

    #[test]
    fn test_score_percent_is_clamped() {
        let mut result = AnalysisResult::default();
        result.overall_score = 12.0;
        assert_eq!(result.score_percent(), 100.0);
        result.overall_score = f64::NAN;
        assert_eq!(result.score_percent(), 0.0);
    }
}
