//! Exercise Catalog
//!
//! The exercise label travels with the video to the analysis service. Any
//! non-blank label is accepted; the catalog only drives selection and search.

use serde::{Deserialize, Serialize};

/// Label used when none is selected
pub const DEFAULT_EXERCISE: &str = "Squat";

/// Chosen exercise label
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExerciseSelection(String);

impl ExerciseSelection {
    /// Trims `label`, falling back to the default when absent or blank
    pub fn new(label: Option<&str>) -> Self {
        let label = label.map(str::trim).filter(|l| !l.is_empty());
        Self(label.unwrap_or(DEFAULT_EXERCISE).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ExerciseSelection {
    fn default() -> Self {
        Self(DEFAULT_EXERCISE.to_string())
    }
}

impl std::fmt::Display for ExerciseSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A quick-pick catalog entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PopularExercise {
    pub id: &'static str,
    pub name: &'static str,
}

pub const POPULAR_EXERCISES: &[PopularExercise] = &[
    PopularExercise { id: "squat", name: "Squat" },
    PopularExercise { id: "pushup", name: "Push-up" },
    PopularExercise { id: "deadlift", name: "Deadlift" },
    PopularExercise { id: "plank", name: "Plank" },
    PopularExercise { id: "lunge", name: "Lunge" },
    PopularExercise { id: "pullup", name: "Pull-up" },
];

/// Browsing category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExerciseCategory {
    UpperBody,
    LowerBody,
    Core,
    Other,
}

impl ExerciseCategory {
    pub const ALL: [ExerciseCategory; 4] = [
        ExerciseCategory::UpperBody,
        ExerciseCategory::LowerBody,
        ExerciseCategory::Core,
        ExerciseCategory::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ExerciseCategory::UpperBody => "Upper Body",
            ExerciseCategory::LowerBody => "Lower Body",
            ExerciseCategory::Core => "Core",
            ExerciseCategory::Other => "Other",
        }
    }

    /// Resolves a category from its label or camelCase name, ignoring case
    /// and separators
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Self::ALL.into_iter().find(|c| {
            let label: String = c.label().chars().filter(|ch| ch.is_alphanumeric()).collect();
            label.to_lowercase() == key
        })
    }

    pub fn exercises(&self) -> &'static [&'static str] {
        match self {
            ExerciseCategory::UpperBody => &[
                "Bench Press",
                "Overhead Press",
                "Bicep Curl",
                "Tricep Dip",
                "Shoulder Press",
                "Lateral Raise",
            ],
            ExerciseCategory::LowerBody => &[
                "Squat",
                "Deadlift",
                "Lunge",
                "Calf Raise",
                "Box Jump",
                "Bulgarian Split Squat",
            ],
            ExerciseCategory::Core => &[
                "Plank",
                "Crunch",
                "Russian Twist",
                "Leg Raise",
                "Mountain Climber",
                "Bicycle Crunch",
            ],
            ExerciseCategory::Other => &[
                "Burpee",
                "Jump Rope",
                "Mountain Climber",
                "High Knees",
                "Jumping Jacks",
                "Bear Crawl",
            ],
        }
    }
}

/// Exercises in `category` whose name contains `query`, ignoring case
pub fn search(category: ExerciseCategory, query: &str) -> Vec<&'static str> {
    let needle = query.trim().to_lowercase();
    category
        .exercises()
        .iter()
        .copied()
        .filter(|name| name.to_lowercase().contains(&needle))
        .collect()
}
