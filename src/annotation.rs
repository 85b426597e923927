use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::summary::PatientSummary;
use crate::error::{AudiogramError, Result};

const LOG_FILE: &str = "log.csv";

/// Reviewers offered when none are configured.
pub const DEFAULT_REVIEWERS: [&str; 3] = ["Audiologist-A", "Audiologist-B", "Audiologist-C"];

// ---------------------------------------------------------------------------
// Categorical judgments
// ---------------------------------------------------------------------------

/// A closed list of labelled options, as shown in a drop-down.
pub trait Choice: Copy + PartialEq + 'static {
    const ALL: &'static [Self];
    fn label(self) -> &'static str;
}

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl Choice for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

choice_enum!(
    /// Degree of hearing loss.
    Degree {
        Normal => "Normal",
        Mild => "Mild",
        Moderate => "Moderate",
        ModeratelySevere => "Moderately Severe",
        Severe => "Severe",
        Profound => "Profound",
        CompleteDeafness => "Complete Deafness",
    }
);

choice_enum!(
    /// Type of hearing loss.
    LossType {
        Normal => "Normal",
        Conductive => "Conductive",
        Sensorineural => "Sensorineural",
        Mixed => "Mixed",
    }
);

choice_enum!(
    /// Shape of the audiogram curve.
    Configuration {
        Normal => "Normal",
        Flat => "Flat",
        Rising => "Rising",
        Sloping => "Sloping",
        TotalDeafness => "Total deafness",
        Irregular => "Irregular",
    }
);

/// Judgments for one ear; any of them may be left blank.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EarJudgment {
    pub degree: Option<Degree>,
    pub loss_type: Option<LossType>,
    pub configuration: Option<Configuration>,
}

/// What the reviewer submits for the patient on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub reviewer: Option<String>,
    pub summary: Option<PatientSummary>,
    pub left: EarJudgment,
    pub right: EarJudgment,
}

fn label_of<C: Choice>(choice: Option<C>) -> String {
    choice.map(|c| c.label().to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// AnnotationLog – append-only CSV
// ---------------------------------------------------------------------------

/// One row of the annotation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "Audiologist Name")]
    pub reviewer: String,
    /// The summary shown at submission time, as JSON.
    #[serde(rename = "PatientInfo")]
    pub patient_info: String,
    #[serde(rename = "Degree (L)")]
    pub degree_left: String,
    #[serde(rename = "Degree (R)")]
    pub degree_right: String,
    #[serde(rename = "Type (L)")]
    pub type_left: String,
    #[serde(rename = "Type (R)")]
    pub type_right: String,
    #[serde(rename = "Configuration (L)")]
    pub configuration_left: String,
    #[serde(rename = "Configuration (R)")]
    pub configuration_right: String,
    #[serde(rename = "timestamp")]
    pub timestamp: String,
}

impl LogEntry {
    /// The summary recorded with this entry, if any.
    pub fn summary(&self) -> Result<Option<PatientSummary>> {
        if self.patient_info.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&self.patient_info)?))
    }
}

/// Append-only CSV log of reviewer annotations.
pub struct AnnotationLog {
    dir: PathBuf,
    path: PathBuf,
}

impl AnnotationLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(LOG_FILE);
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `annotation`.  Without a reviewer nothing is written and
    /// [`AudiogramError::MissingReviewer`] is returned.
    pub fn submit(&self, annotation: &Annotation) -> Result<LogEntry> {
        let reviewer = annotation
            .reviewer
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(AudiogramError::MissingReviewer)?;

        let patient_info = match &annotation.summary {
            Some(summary) => serde_json::to_string(summary)?,
            None => String::new(),
        };

        let entry = LogEntry {
            reviewer: reviewer.to_string(),
            patient_info,
            degree_left: label_of(annotation.left.degree),
            degree_right: label_of(annotation.right.degree),
            type_left: label_of(annotation.left.loss_type),
            type_right: label_of(annotation.right.loss_type),
            configuration_left: label_of(annotation.left.configuration),
            configuration_right: label_of(annotation.right.configuration),
            timestamp: chrono::Local::now().to_rfc3339(),
        };

        fs::create_dir_all(&self.dir)?;
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(&entry)?;
        writer.flush()?;

        log::info!(
            "Recorded annotation by {} for patient {}",
            entry.reviewer,
            annotation
                .summary
                .as_ref()
                .map(|s| s.patient_id.to_string())
                .unwrap_or_else(|| "?".into())
        );
        Ok(entry)
    }

    /// All entries written so far; empty when nothing was logged yet.
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(reader) => reader,
            Err(e) => match e.kind() {
                csv::ErrorKind::Io(io) if io.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                _ => return Err(e.into()),
            },
        };
        reader
            .deserialize()
            .map(|row| row.map_err(AudiogramError::from))
            .collect()
    }

    /// Remove the annotation directory.  A missing directory is fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
