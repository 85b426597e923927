use serde::{Deserialize, Serialize};

use super::model::{Conduction, EarSide, PatientRecord};

/// Slots averaged for the pure-tone average: 500 Hz, 1 kHz, 2 kHz, 4 kHz.
const PTA_SLOTS: std::ops::Range<usize> = 1..5;

// ---------------------------------------------------------------------------
// PatientSummary – the cached JSON projection of a record
// ---------------------------------------------------------------------------

/// Human-readable projection of a [`PatientRecord`], serialised with the
/// keys shown to reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummary {
    #[serde(rename = "Patient-ID")]
    pub patient_id: usize,
    #[serde(rename = "Sex")]
    pub sex: String,
    #[serde(rename = "Age")]
    pub age: i64,
    #[serde(rename = "AC (R)")]
    pub ac_right: String,
    #[serde(rename = "AC (L)")]
    pub ac_left: String,
    #[serde(rename = "BC (R)")]
    pub bc_right: String,
    #[serde(rename = "BC (L)")]
    pub bc_left: String,
    #[serde(rename = "PTA (R)")]
    pub pta_right: String,
    #[serde(rename = "PTA (L)")]
    pub pta_left: String,
}

impl PatientSummary {
    /// Summarise the record stored at `index`.
    pub fn from_record(index: usize, record: &PatientRecord) -> Self {
        let gram = &record.audiogram;
        let joined = |c: Conduction, s: EarSide| join_thresholds(&gram.series(c, s).values);
        let pta = |s: EarSide| format_pta(&gram.series(Conduction::Air, s).values);

        Self {
            patient_id: index,
            sex: record.sex.clone(),
            age: record.age,
            ac_right: joined(Conduction::Air, EarSide::Right),
            ac_left: joined(Conduction::Air, EarSide::Left),
            bc_right: joined(Conduction::Bone, EarSide::Right),
            bc_left: joined(Conduction::Bone, EarSide::Left),
            pta_right: pta(EarSide::Right),
            pta_left: pta(EarSide::Left),
        }
    }

    pub fn pta(&self, side: EarSide) -> &str {
        match side {
            EarSide::Left => &self.pta_left,
            EarSide::Right => &self.pta_right,
        }
    }

    /// `(key, value)` pairs in display order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Patient-ID", self.patient_id.to_string()),
            ("Sex", self.sex.clone()),
            ("Age", self.age.to_string()),
            ("AC (R)", self.ac_right.clone()),
            ("AC (L)", self.ac_left.clone()),
            ("BC (R)", self.bc_right.clone()),
            ("BC (L)", self.bc_left.clone()),
            ("PTA (R)", self.pta_right.clone()),
            ("PTA (L)", self.pta_left.clone()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `[20, 25, 30]` → `"20, 25, 30"`.
pub fn join_thresholds(values: &[i32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn pta_window(values: &[i32]) -> &[i32] {
    let end = PTA_SLOTS.end.min(values.len());
    let start = PTA_SLOTS.start.min(end);
    &values[start..end]
}

/// Mean of the four mid-frequency air thresholds.  NaN when the series is
/// too short to contain any of them.
pub fn pure_tone_average(values: &[i32]) -> f64 {
    let window = pta_window(values);
    if window.is_empty() {
        return f64::NAN;
    }
    window.iter().map(|&v| v as f64).sum::<f64>() / window.len() as f64
}

/// Pure-tone average with one decimal, rounding ties to even.
///
/// The mean of four integers is a multiple of 0.25, so ties are common;
/// rounding is done on the exact rational `10 * sum / n`.
pub fn format_pta(values: &[i32]) -> String {
    let window = pta_window(values);
    if window.is_empty() {
        return "nan".to_string();
    }
    let numerator = 10 * window.iter().map(|&v| v as i64).sum::<i64>();
    let denominator = window.len() as i64;

    let mut tenths = numerator.div_euclid(denominator);
    let twice_rem = 2 * numerator.rem_euclid(denominator);
    if twice_rem > denominator || (twice_rem == denominator && tenths % 2 != 0) {
        tenths += 1;
    }

    let sign = if tenths < 0 { "-" } else { "" };
    let abs = tenths.abs();
    format!("{sign}{}.{}", abs / 10, abs % 10)
}
