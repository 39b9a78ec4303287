//! FormCheck CLI
//!
//! Headless driver for the capture → validate → submit → results pipeline.
//!
//! **Usage:**
//! ```bash
//! formcheck exercises [--category <name>] [--search <text>]
//! formcheck validate <file> [--drop]
//! formcheck analyze <file> --exercise <name> [--drop] [--json]
//! formcheck record <file> --exercise <name> [--chunk-size <bytes>] [--json]
//! formcheck settings [--save | --reset]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};

use formcheck_lib::core::analysis::{
    AbortSignal, AnalysisResult, IssueMarker, ScoreGrade, SubmissionEvent,
};
use formcheck_lib::core::capture::ReplayCamera;
use formcheck_lib::core::exercises::{self, ExerciseCategory, POPULAR_EXERCISES};
use formcheck_lib::core::media::{CandidateFile, IntakePath, Validator};
use formcheck_lib::core::settings::{ClientSettings, SettingsManager};
use formcheck_lib::core::{bytes_to_mib, format_clock, ObjectUrl};
use formcheck_lib::{CoreError, FormCheckFlow};

#[derive(Parser, Debug)]
#[clap(name = "formcheck")]
#[clap(about = "Capture, validate and analyze exercise videos")]
struct Cli {
    /// Analysis service base URL
    #[clap(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// User identity sent with submissions
    #[clap(long, global = true)]
    user_id: Option<String>,

    /// Upper bound on one analysis request (seconds)
    #[clap(long, global = true)]
    timeout_secs: Option<u64>,

    /// Directory holding settings.json
    #[clap(long, global = true, value_name = "DIR")]
    settings_dir: Option<PathBuf>,

    /// Debug-level logging
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the exercise catalog
    Exercises {
        /// Category to browse (e.g. "Upper Body")
        #[clap(long)]
        category: Option<String>,

        /// Case-insensitive name filter within the category
        #[clap(long)]
        search: Option<String>,
    },

    /// Check a file against the upload rules
    Validate {
        file: PathBuf,

        /// Treat the file as drag-dropped
        #[clap(long)]
        drop: bool,
    },

    /// Submit a video file for analysis
    Analyze {
        file: PathBuf,

        #[clap(long)]
        exercise: Option<String>,

        /// Treat the file as drag-dropped
        #[clap(long)]
        drop: bool,

        /// Print the result as JSON
        #[clap(long)]
        json: bool,
    },

    /// Record through the replay camera, then analyze the recording
    Record {
        /// Pre-recorded take to replay
        file: PathBuf,

        #[clap(long)]
        exercise: Option<String>,

        /// Bytes per recorder data event
        #[clap(long, default_value = "65536")]
        chunk_size: usize,

        /// Print the result as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show, persist or reset client settings
    Settings {
        /// Persist the resolved settings, including flags
        #[clap(long, conflicts_with = "reset")]
        save: bool,

        /// Delete the settings file
        #[clap(long)]
        reset: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultReport<'a> {
    exercise: &'a str,
    grade: ScoreGrade,
    score_percent: f64,
    result: &'a AnalysisResult,
    markers: Vec<IssueMarker>,
    video_url: Option<&'a ObjectUrl>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Exercises { category, search } => {
            list_exercises(category.as_deref(), search.as_deref())
        }
        Command::Validate { file, drop } => validate(file, intake(*drop)),
        Command::Analyze {
            file,
            exercise,
            drop,
            json,
        } => {
            let settings = resolve_settings(&cli, settings_manager(&cli).ok().as_ref());
            analyze(settings, file, exercise.as_deref(), intake(*drop), *json).await
        }
        Command::Record {
            file,
            exercise,
            chunk_size,
            json,
        } => {
            let settings = resolve_settings(&cli, settings_manager(&cli).ok().as_ref());
            record(settings, file, exercise.as_deref(), *chunk_size, *json).await
        }
        Command::Settings { save, reset } => {
            let manager = settings_manager(&cli)?;
            let settings = resolve_settings(&cli, Some(&manager));
            manage_settings(&manager, settings, *save, *reset)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "formcheck=debug,formcheck_lib=debug"
    } else {
        "formcheck=info,formcheck_lib=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn settings_manager(cli: &Cli) -> anyhow::Result<SettingsManager> {
    match &cli.settings_dir {
        Some(dir) => Ok(SettingsManager::new(dir.clone())),
        None => SettingsManager::in_default_dir().map_err(|e| {
            warn!("No settings directory, using defaults: {}", e);
            anyhow!(e)
        }),
    }
}

/// File, then environment, then flags. Without a manager the file layer is skipped.
fn resolve_settings(cli: &Cli, manager: Option<&SettingsManager>) -> ClientSettings {
    let mut settings = match manager {
        Some(manager) => manager.resolve(),
        None => {
            let mut settings = ClientSettings::default();
            settings.apply_env();
            settings
        }
    };
    if let Some(url) = &cli.api_url {
        settings.api_url = url.clone();
    }
    if let Some(user_id) = &cli.user_id {
        settings.user_id = user_id.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        settings.request_timeout_secs = secs;
    }
    settings.normalize();
    debug!("Resolved settings: {:?}", settings);
    settings
}

/// Reads a candidate, keeping validation rejections unwrapped
fn load_candidate(file: &Path) -> anyhow::Result<CandidateFile> {
    match CandidateFile::from_path(file) {
        Ok(candidate) => Ok(candidate),
        Err(CoreError::Validation(e)) => Err(e.into()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to read {}", file.display()))),
    }
}

fn intake(drop: bool) -> IntakePath {
    if drop {
        IntakePath::Drop
    } else {
        IntakePath::Picker
    }
}

// =============================================================================
// Commands
// =============================================================================

fn list_exercises(category: Option<&str>, search: Option<&str>) -> anyhow::Result<()> {
    let categories = match category {
        Some(raw) => vec![ExerciseCategory::parse(raw)
            .ok_or_else(|| anyhow!("Unknown category {:?}", raw))?],
        None => ExerciseCategory::ALL.to_vec(),
    };

    if category.is_none() && search.is_none() {
        println!("Popular:");
        for exercise in POPULAR_EXERCISES {
            println!("  {:<10} {}", exercise.id, exercise.name);
        }
    }

    for category in categories {
        let names = exercises::search(category, search.unwrap_or(""));
        if names.is_empty() {
            continue;
        }
        println!("{}:", category.label());
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn validate(file: &Path, path: IntakePath) -> anyhow::Result<()> {
    let candidate = load_candidate(file)?;

    Validator::new().validate(&candidate, path)?;
    println!(
        "OK: {} ({}, {:.1}MB)",
        file.display(),
        candidate.mime_type,
        bytes_to_mib(candidate.size())
    );
    Ok(())
}

async fn analyze(
    settings: ClientSettings,
    file: &Path,
    exercise: Option<&str>,
    path: IntakePath,
    json: bool,
) -> anyhow::Result<()> {
    let candidate = load_candidate(file)?;

    let mut flow = FormCheckFlow::new(settings)?;
    flow.select_exercise(exercise);
    if !flow.accept_file(candidate, path) {
        bail!(flow
            .acquirer()
            .last_error()
            .unwrap_or("File rejected")
            .to_string());
    }
    submit_and_report(&mut flow, json).await
}

async fn record(
    settings: ClientSettings,
    file: &Path,
    exercise: Option<&str>,
    chunk_size: usize,
    json: bool,
) -> anyhow::Result<()> {
    let camera = ReplayCamera::from_file(file, chunk_size)?;

    let mut flow = FormCheckFlow::new(settings)?;
    flow.select_exercise(exercise);
    if !flow.open_camera(&camera).await {
        bail!(flow
            .acquirer()
            .last_error()
            .unwrap_or("Camera unavailable")
            .to_string());
    }

    flow.start_recording()?;
    // Pull data events until the recorder goes quiet
    while let Ok(Some(count)) =
        tokio::time::timeout(Duration::from_millis(100), flow.next_chunk()).await
    {
        debug!("Recorded chunk {}", count);
    }
    let size = flow.stop_recording()?.size();
    info!(
        "Recorded {} bytes in {}",
        size,
        format_clock(flow.acquirer().elapsed_secs())
    );

    submit_and_report(&mut flow, json).await
}

fn manage_settings(
    manager: &SettingsManager,
    settings: ClientSettings,
    save: bool,
    reset: bool,
) -> anyhow::Result<()> {
    let shown = if reset {
        manager.reset()?
    } else if save {
        manager.save(&settings)?
    } else {
        settings
    };
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

// =============================================================================
// Submission
// =============================================================================

async fn submit_and_report(flow: &mut FormCheckFlow, json: bool) -> anyhow::Result<()> {
    if let Err(affordance) = flow.proceed_to_analysis() {
        bail!("{}: {}", affordance.title, affordance.message);
    }

    if let Some(mut events) = flow.take_submission_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let SubmissionEvent::Progress(progress) = event {
                    eprintln!(
                        "[{:>3}%] vision: {:?}, coaching: {:?}",
                        progress.percent, progress.vision, progress.coaching
                    );
                }
            }
        });
    }

    let signal = AbortSignal::new();
    let cancel = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && cancel.cancel_by_user() {
            eprintln!("Cancelling...");
        }
    });

    if let Err(e) = flow.run_analysis(&signal).await {
        if !e.recovery_actions().is_empty() {
            eprintln!("Retry with the same file, or start over with another video.");
        }
        return Err(anyhow!(e.to_user_message()));
    }

    let context = flow
        .results()
        .map_err(|affordance| anyhow!("{}: {}", affordance.title, affordance.message))?;
    let frame_rate = flow.settings().frame_rate;
    let report = ResultReport {
        exercise: context.exercise.as_str(),
        grade: context.results.grade(),
        score_percent: context.results.score_percent(),
        result: &context.results,
        markers: context.results.markers(frame_rate),
        video_url: context.video_url.as_ref(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ResultReport<'_>) {
    let result = report.result;
    println!(
        "{}: {:.1}/10 ({:?})",
        report.exercise, result.overall_score, report.grade
    );

    if !result.issues.is_empty() {
        println!("Issues:");
        for (issue, marker) in result.issues.iter().zip(&report.markers) {
            println!(
                "  [{:?}] {} at {} (frames {}-{}): {}",
                issue.severity,
                issue.issue_type,
                format_clock(marker.time_sec as u64),
                issue.frame_start,
                issue.frame_end,
                issue.cue
            );
        }
    }
    if !result.strengths.is_empty() {
        println!("Strengths:");
        for strength in &result.strengths {
            println!("  + {}", strength);
        }
    }
    if !result.metrics.is_empty() {
        println!("Metrics:");
        for (name, metric) in &result.metrics {
            println!(
                "  {}: {} (target {}) [{:?}]",
                name, metric.actual, metric.target, metric.status
            );
        }
    }
    if !result.recommendations.is_empty() {
        println!("Recommendations:");
        for recommendation in &result.recommendations {
            println!("  - {}", recommendation);
        }
    }
    if let Some(url) = report.video_url {
        println!("Video: {}", url);
    }
}
