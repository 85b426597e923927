use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AudiogramError, Result};

// ---------------------------------------------------------------------------
// Axes conventions
// ---------------------------------------------------------------------------

/// Test frequencies in chart order.  Air conduction uses all six,
/// bone conduction the first five.
pub const FREQUENCY_LABELS: [&str; 6] = ["250", "500", "1K", "2K", "4K", "8K"];

/// Which ear an audiogram series belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EarSide {
    Left,
    Right,
}

impl EarSide {
    pub const ALL: [EarSide; 2] = [EarSide::Left, EarSide::Right];

    /// One-letter code used in archive keys (`acl`, `bcr`, ...).
    pub fn code(self) -> &'static str {
        match self {
            EarSide::Left => "l",
            EarSide::Right => "r",
        }
    }

    /// Suffix used in cached plot file names.
    pub fn file_suffix(self) -> &'static str {
        match self {
            EarSide::Left => "left",
            EarSide::Right => "right",
        }
    }

    /// Upper-case tag used in summary keys, e.g. `PTA (R)`.
    pub fn tag(self) -> &'static str {
        match self {
            EarSide::Left => "L",
            EarSide::Right => "R",
        }
    }
}

impl fmt::Display for EarSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EarSide::Left => write!(f, "Left"),
            EarSide::Right => write!(f, "Right"),
        }
    }
}

/// How the stimulus was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conduction {
    Air,
    Bone,
}

impl Conduction {
    pub const ALL: [Conduction; 2] = [Conduction::Air, Conduction::Bone];

    /// Number of measured frequencies for this conduction mode.
    pub fn point_count(self) -> usize {
        match self {
            Conduction::Air => 6,
            Conduction::Bone => 5,
        }
    }

    /// `AC` / `BC`, as printed in legends and summaries.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Conduction::Air => "AC",
            Conduction::Bone => "BC",
        }
    }

    /// Archive key for a given ear, e.g. `acl` or `bcr`.
    pub fn key(self, side: EarSide) -> String {
        format!("{}{}", self.abbreviation().to_ascii_lowercase(), side.code())
    }
}

// ---------------------------------------------------------------------------
// PointCategory – masked × no-response partition of a series
// ---------------------------------------------------------------------------

/// The four marker categories of an audiogram point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointCategory {
    MaskedResponse,
    MaskedNoResponse,
    UnmaskedResponse,
    UnmaskedNoResponse,
}

impl PointCategory {
    /// Drawing and legend order.
    pub const ALL: [PointCategory; 4] = [
        PointCategory::MaskedResponse,
        PointCategory::MaskedNoResponse,
        PointCategory::UnmaskedResponse,
        PointCategory::UnmaskedNoResponse,
    ];

    /// No-response takes precedence for colour; masking only picks the marker.
    pub fn classify(masked: bool, no_response: bool) -> Self {
        match (no_response, masked) {
            (true, true) => PointCategory::MaskedNoResponse,
            (true, false) => PointCategory::UnmaskedNoResponse,
            (false, true) => PointCategory::MaskedResponse,
            (false, false) => PointCategory::UnmaskedResponse,
        }
    }

    pub fn is_masked(self) -> bool {
        matches!(
            self,
            PointCategory::MaskedResponse | PointCategory::MaskedNoResponse
        )
    }

    pub fn is_no_response(self) -> bool {
        matches!(
            self,
            PointCategory::MaskedNoResponse | PointCategory::UnmaskedNoResponse
        )
    }

    /// Legend label for a conduction mode, e.g. `AC masked NoResp`.
    pub fn legend_label(self, conduction: Conduction) -> String {
        let suffix = match self {
            PointCategory::MaskedResponse => " masked",
            PointCategory::MaskedNoResponse => " masked NoResp",
            PointCategory::UnmaskedResponse => "",
            PointCategory::UnmaskedNoResponse => " NoResp",
        };
        format!("{}{suffix}", conduction.abbreviation())
    }
}

// ---------------------------------------------------------------------------
// ThresholdSeries – one conduction mode of one ear
// ---------------------------------------------------------------------------

/// Thresholds (dBHL) with parallel masking / no-response flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThresholdSeries {
    pub values: Vec<i32>,
    pub masked: Vec<bool>,
    pub no_response: Vec<bool>,
}

impl ThresholdSeries {
    pub fn new(values: Vec<i32>, masked: Vec<bool>, no_response: Vec<bool>) -> Self {
        Self {
            values,
            masked,
            no_response,
        }
    }

    /// A series with every point responded to and unmasked.
    pub fn unflagged(values: Vec<i32>) -> Self {
        let n = values.len();
        Self::new(values, vec![false; n], vec![false; n])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(frequency slot, threshold, category)` for every point.
    pub fn points(&self) -> impl Iterator<Item = (usize, i32, PointCategory)> + '_ {
        self.values
            .iter()
            .zip(self.masked.iter().zip(self.no_response.iter()))
            .enumerate()
            .map(|(slot, (&value, (&masked, &no_response)))| {
                (slot, value, PointCategory::classify(masked, no_response))
            })
    }

    fn validate(&self, expected: usize, name: &str) -> Result<()> {
        if self.values.len() != expected {
            return Err(AudiogramError::Schema(format!(
                "'{name}' has {} thresholds, expected {expected}",
                self.values.len()
            )));
        }
        if self.masked.len() != expected || self.no_response.len() != expected {
            return Err(AudiogramError::Schema(format!(
                "'{name}' flags have lengths {}/{}, expected {expected}",
                self.masked.len(),
                self.no_response.len()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Audiogram / PatientRecord
// ---------------------------------------------------------------------------

/// Both ears, both conduction modes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Audiogram {
    pub ac_left: ThresholdSeries,
    pub ac_right: ThresholdSeries,
    pub bc_left: ThresholdSeries,
    pub bc_right: ThresholdSeries,
}

impl Audiogram {
    pub fn series(&self, conduction: Conduction, side: EarSide) -> &ThresholdSeries {
        match (conduction, side) {
            (Conduction::Air, EarSide::Left) => &self.ac_left,
            (Conduction::Air, EarSide::Right) => &self.ac_right,
            (Conduction::Bone, EarSide::Left) => &self.bc_left,
            (Conduction::Bone, EarSide::Right) => &self.bc_right,
        }
    }

    pub fn series_mut(&mut self, conduction: Conduction, side: EarSide) -> &mut ThresholdSeries {
        match (conduction, side) {
            (Conduction::Air, EarSide::Left) => &mut self.ac_left,
            (Conduction::Air, EarSide::Right) => &mut self.ac_right,
            (Conduction::Bone, EarSide::Left) => &mut self.bc_left,
            (Conduction::Bone, EarSide::Right) => &mut self.bc_right,
        }
    }

    /// Check every series has the length its conduction mode requires.
    pub fn validate(&self) -> Result<()> {
        for conduction in Conduction::ALL {
            for side in EarSide::ALL {
                self.series(conduction, side)
                    .validate(conduction.point_count(), &conduction.key(side))?;
            }
        }
        Ok(())
    }
}

/// One patient (one row of the archive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
    pub sex: String,
    pub age: i64,
    pub audiogram: Audiogram,
}

// ---------------------------------------------------------------------------
// PatientTable – the complete loaded archive
// ---------------------------------------------------------------------------

/// All records, indexed densely from zero.  Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct PatientTable {
    records: Vec<PatientRecord>,
}

impl PatientTable {
    /// Build a table, rejecting records whose series have the wrong shape.
    pub fn from_records(records: Vec<PatientRecord>) -> Result<Self> {
        for (i, rec) in records.iter().enumerate() {
            rec.audiogram
                .validate()
                .map_err(|e| AudiogramError::Schema(format!("record {i}: {e}")))?;
        }
        Ok(Self { records })
    }

    /// Record at `index`, or [`AudiogramError::IndexOutOfRange`].
    pub fn get(&self, index: usize) -> Result<&PatientRecord> {
        self.records
            .get(index)
            .ok_or(AudiogramError::IndexOutOfRange {
                index,
                len: self.records.len(),
            })
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    /// Number of patients.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
