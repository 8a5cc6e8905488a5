// Job Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::patch::JobPatch;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Job Status
///
/// `Pending -> Processing -> {Completed | Failed}`, plus `Pending -> Failed` on
/// cancellation. Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Transformation toggles handed to the worker as a JSON object (camelCase keys)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct StyleOptions {
    pub color_palette: bool,
    pub contrast_brightness: bool,
    pub film_grain: bool,
    pub match_pacing: bool,
    pub auto_transitions: bool,
    pub speed_adjustments: bool,
    pub audio_normalization: bool,
    pub background_music: bool,
    pub sound_effects: bool,
}

impl StyleOptions {
    /// Wire names of every toggle, in declaration order
    pub const KEYS: [&'static str; 9] = [
        "colorPalette",
        "contrastBrightness",
        "filmGrain",
        "matchPacing",
        "autoTransitions",
        "speedAdjustments",
        "audioNormalization",
        "backgroundMusic",
        "soundEffects",
    ];
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            color_palette: true,
            contrast_brightness: true,
            film_grain: false,
            match_pacing: true,
            auto_transitions: false,
            speed_adjustments: false,
            audio_normalization: true,
            background_music: false,
            sound_effects: false,
        }
    }
}

/// Result payload reported by the worker on its `METRICS:` line
///
/// The four named fields are required. Numbers keep the representation the
/// worker sent (`82` stays an integer) and unrecognised fields are carried in
/// `extra`, so the stored record serializes back to the reported object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub processing_time: String,
    pub style_match: serde_json::Number,
    pub colors_analyzed: serde_json::Number,
    pub output_size: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobMetrics {
    pub fn new(
        processing_time: impl Into<String>,
        style_match: impl Into<serde_json::Number>,
        colors_analyzed: impl Into<serde_json::Number>,
        output_size: impl Into<String>,
    ) -> Self {
        Self {
            processing_time: processing_time.into(),
            style_match: style_match.into(),
            colors_analyzed: colors_analyzed.into(),
            output_size: output_size.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Job Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,

    // Inputs (immutable once processing starts)
    pub input_path: String,
    pub reference_path: Option<String>,
    pub style_template: Option<String>,
    pub options: StyleOptions,

    pub status: JobStatus,
    pub progress: u8,

    // Outcome: output_path + metrics on success, error_message on failure
    pub output_path: Option<String>,
    pub error_message: Option<String>,
    pub metrics: Option<JobMetrics>,

    pub created_at: i64, // epoch ms
    pub updated_at: i64, // epoch ms
}

impl Job {
    /// Create a Pending job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        input_path: impl Into<String>,
        reference_path: Option<String>,
        style_template: Option<String>,
        options: StyleOptions,
    ) -> Self {
        Self {
            id: id.into(),
            input_path: input_path.into(),
            reference_path,
            style_template,
            options,
            status: JobStatus::Pending,
            progress: 0,
            output_path: None,
            error_message: None,
            metrics: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Create a test job with deterministic ID and timestamp.
    ///
    /// IDs are `test-1`, `test-2`, ...; timestamps start at 1000 and increment by 1000.
    /// Production code injects ID and time via providers.
    pub fn new_test(input_path: impl Into<String>) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(
            format!("test-{}", counter),
            (counter * 1000) as i64,
            input_path,
            None,
            Some("cinematic".to_string()),
            StyleOptions::default(),
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a patch whose precondition has already been checked by the store.
    ///
    /// Rejects patches that would break the state machine.
    pub fn apply(&mut self, patch: &JobPatch) -> Result<()> {
        if let Some(next) = patch.status {
            if !self.status.can_transition_to(next) {
                return Err(DomainError::InvalidStateTransition {
                    from: self.status.to_string(),
                    to: next.to_string(),
                });
            }
            self.status = next;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress;
        }
        if let Some(output_path) = &patch.output_path {
            self.output_path = Some(output_path.clone());
        }
        if let Some(error_message) = &patch.error_message {
            self.error_message = Some(error_message.clone());
        }
        if let Some(metrics) = &patch.metrics {
            self.metrics = Some(metrics.clone());
        }
        self.updated_at = patch.updated_at;
        Ok(())
    }
}
