//! Session Handoff
//!
//! Carries the exercise, the active asset and, later, the result between
//! flow stages. Each stage validates what it needs on entry; a missing piece
//! yields a [`RecoveryAffordance`] pointing back to exercise selection
//! instead of an error.

use serde::{Deserialize, Serialize};

use crate::core::analysis::AnalysisResult;
use crate::core::exercises::ExerciseSelection;
use crate::core::media::MediaAsset;
use crate::core::ObjectUrl;

/// Flow stages, in order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowStage {
    #[default]
    ExerciseSelection,
    Upload,
    Analyzing,
    Results,
}

/// What to show when a stage is entered without its inputs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryAffordance {
    pub title: String,
    pub message: String,
    pub action_label: String,
    pub target: FlowStage,
}

impl RecoveryAffordance {
    pub fn missing_video() -> Self {
        Self {
            title: "Missing Video".to_string(),
            message: "Please upload a video to analyze.".to_string(),
            action_label: "Go Back".to_string(),
            target: FlowStage::ExerciseSelection,
        }
    }

    pub fn no_results() -> Self {
        Self {
            title: "No Results Found".to_string(),
            message: "Please upload and analyze a video first.".to_string(),
            action_label: "Start New Analysis".to_string(),
            target: FlowStage::ExerciseSelection,
        }
    }
}

/// Inputs of the analyzing stage
#[derive(Debug, Clone)]
pub struct AnalyzingContext {
    pub exercise: ExerciseSelection,
    pub video: MediaAsset,
}

/// Inputs of the results stage
#[derive(Debug, Clone)]
pub struct ResultsContext {
    pub exercise: ExerciseSelection,
    pub results: AnalysisResult,
    pub video_url: Option<ObjectUrl>,
}

/// State passed from one stage to the next
#[derive(Debug, Clone, Default)]
pub struct SessionHandoff {
    pub exercise: Option<ExerciseSelection>,
    pub video: Option<MediaAsset>,
    pub video_url: Option<ObjectUrl>,
    pub results: Option<AnalysisResult>,
}

impl SessionHandoff {
    /// Handoff from upload to analyzing
    pub fn for_analysis(exercise: ExerciseSelection, video: Option<MediaAsset>) -> Self {
        Self {
            exercise: Some(exercise),
            video,
            video_url: None,
            results: None,
        }
    }

    /// Validates the analyzing stage's inputs.
    ///
    /// A missing exercise label falls back to the default; a missing video
    /// cannot be recovered in place.
    pub fn enter_analyzing(&self) -> Result<AnalyzingContext, RecoveryAffordance> {
        let video = self
            .video
            .clone()
            .ok_or_else(RecoveryAffordance::missing_video)?;
        Ok(AnalyzingContext {
            exercise: self.exercise.clone().unwrap_or_default(),
            video,
        })
    }

    /// Handoff from analyzing to results
    pub fn with_results(mut self, results: AnalysisResult, video_url: ObjectUrl) -> Self {
        self.results = Some(results);
        self.video_url = Some(video_url);
        self
    }

    /// Validates the results stage's inputs
    pub fn enter_results(&self) -> Result<ResultsContext, RecoveryAffordance> {
        let results = self
            .results
            .clone()
            .ok_or_else(RecoveryAffordance::no_results)?;
        Ok(ResultsContext {
            exercise: self.exercise.clone().unwrap_or_default(),
            results,
            video_url: self.video_url.clone(),
        })
    }
}
