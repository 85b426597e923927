use std::path::Path;
use std::sync::Arc;

use audiogram_annotator::annotation::{Annotation, AnnotationLog, EarJudgment};
use audiogram_annotator::cache::CacheManager;
use audiogram_annotator::data::loader;
use audiogram_annotator::data::model::EarSide;
use audiogram_annotator::data::summary::PatientSummary;
use audiogram_annotator::error::Result;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// A chart held in memory for display.
pub struct ChartImage {
    /// Image-cache key, unique per archive and patient.
    pub uri: String,
    pub bytes: Arc<[u8]>,
}

/// Feedback line under the Submit button.
pub enum Status {
    Info(String),
    Error(String),
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub cache: CacheManager,
    pub log: AnnotationLog,

    /// Names offered in the reviewer drop-down.
    pub reviewers: Vec<String>,
    pub reviewer: Option<String>,

    /// Patient on screen.
    pub index: usize,
    pub summary: Option<PatientSummary>,
    pub right_chart: Option<ChartImage>,
    pub left_chart: Option<ChartImage>,

    pub left: EarJudgment,
    pub right: EarJudgment,

    pub status: Option<Status>,

    /// Bumped whenever a different archive is opened.
    generation: u64,
}

impl AppState {
    pub fn new(cache: CacheManager, log: AnnotationLog, reviewers: Vec<String>) -> Self {
        let mut state = Self {
            cache,
            log,
            reviewers,
            reviewer: None,
            index: 0,
            summary: None,
            right_chart: None,
            left_chart: None,
            left: EarJudgment::default(),
            right: EarJudgment::default(),
            status: None,
            generation: 0,
        };
        state.select(0);
        state
    }

    /// Show patient `index`, generating its cache entries on first view.
    pub fn select(&mut self, index: usize) {
        self.index = index;
        // Never leave another patient's data on screen under this index.
        self.summary = None;
        self.right_chart = None;
        self.left_chart = None;
        if self.cache.is_empty() {
            return;
        }
        if let Err(e) = self.load_current() {
            log::error!("Failed to prepare patient {index}: {e}");
            self.status = Some(Status::Error(format!("Error: {e}")));
        }
    }

    fn load_current(&mut self) -> Result<()> {
        self.summary = Some(self.cache.get_summary(self.index)?);
        let plots = self.cache.get_plots(self.index)?;
        self.right_chart = Some(self.chart(plots.get(EarSide::Right), EarSide::Right)?);
        self.left_chart = Some(self.chart(plots.get(EarSide::Left), EarSide::Left)?);
        Ok(())
    }

    fn chart(&self, path: &Path, side: EarSide) -> Result<ChartImage> {
        let bytes: Arc<[u8]> = std::fs::read(path)?.into();
        Ok(ChartImage {
            uri: format!(
                "bytes://audiogram/{}/{}-{}.png",
                self.generation,
                self.index,
                side.file_suffix()
            ),
            bytes,
        })
    }

    /// Replace the patient table with the archive at `path`.  The cache is
    /// keyed by index only, so the old entries are discarded first.
    pub fn open_archive(&mut self, path: &Path) -> Result<()> {
        let table = loader::load_archive(path)?;
        self.cache.clear()?;
        self.cache = CacheManager::new(Arc::new(table), self.cache.cache_dir().to_path_buf());
        self.generation += 1;
        self.status = Some(Status::Info(format!(
            "Opened {} ({} patients)",
            path.display(),
            self.cache.len()
        )));
        self.select(0);
        Ok(())
    }

    /// Log the current judgments.
    pub fn submit(&mut self) {
        let annotation = Annotation {
            reviewer: self.reviewer.clone(),
            summary: self.summary.clone(),
            left: self.left,
            right: self.right,
        };
        self.status = Some(match self.log.submit(&annotation) {
            Ok(entry) => Status::Info(format!(
                "Saved annotation by {} for patient {}",
                entry.reviewer, self.index
            )),
            Err(e) => {
                log::warn!("Annotation rejected: {e}");
                Status::Error(e.to_string())
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiogram_annotator::data::model::{Audiogram, PatientRecord, PatientTable, ThresholdSeries};

    fn state(dir: &Path) -> AppState {
        let record = PatientRecord {
            sex: "F".into(),
            age: 40,
            audiogram: Audiogram {
                ac_left: ThresholdSeries::unflagged(vec![10; 6]),
                ac_right: ThresholdSeries::unflagged(vec![20, 25, 30, 35, 40, 45]),
                bc_left: ThresholdSeries::unflagged(vec![5; 5]),
                bc_right: ThresholdSeries::unflagged(vec![15; 5]),
            },
        };
        let table = PatientTable::from_records(vec![record]).unwrap();
        AppState::new(
            CacheManager::new(Arc::new(table), dir.join("cache")),
            AnnotationLog::new(dir.join("annotation")),
            vec!["Audiologist-A".into()],
        )
    }

    #[test]
    fn failed_selection_drops_the_previous_patient() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        assert!(state.summary.is_some() && state.left_chart.is_some());

        state.select(3);
        assert_eq!(state.index, 3);
        assert!(state.summary.is_none());
        assert!(state.left_chart.is_none() && state.right_chart.is_none());
        assert!(matches!(state.status, Some(Status::Error(_))));

        state.reviewer = Some("Audiologist-A".into());
        state.submit();
        let entries = state.log.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].summary().unwrap(), None);
    }

    #[test]
    fn valid_selection_loads_summary_and_charts() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        state.select(0);
        assert_eq!(state.summary.as_ref().unwrap().pta_right, "32.5");
        assert!(state.right_chart.as_ref().unwrap().bytes.starts_with(b"\x89PNG"));
    }
}
