use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::data::model::{EarSide, PatientTable};
use crate::data::summary::PatientSummary;
use crate::error::Result;
use crate::render;

const PATIENT_INFO_DIR: &str = "patient_info";
const PLOTS_DIR: &str = "plots";

// ---------------------------------------------------------------------------
// Cache artefacts
// ---------------------------------------------------------------------------

/// Cached chart files of one patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotPaths {
    pub left: PathBuf,
    pub right: PathBuf,
}

impl PlotPaths {
    pub fn get(&self, side: EarSide) -> &Path {
        match side {
            EarSide::Left => &self.left,
            EarSide::Right => &self.right,
        }
    }
}

/// How many artefacts this manager has derived from records (cache misses).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub summaries_generated: usize,
    pub plots_generated: usize,
}

// ---------------------------------------------------------------------------
// CacheManager – compute-if-absent over the cache directory
// ---------------------------------------------------------------------------

/// Lazily materialises summaries and charts under a cache directory:
///
/// ```text
///  cache/
///    patient_info/{index}.json
///    plots/{index}-left.png
///    plots/{index}-right.png
/// ```
///
/// Entries are never invalidated.  Output is fully determined by the
/// index, so two callers racing on the same entry only duplicate work.
pub struct CacheManager {
    table: Arc<PatientTable>,
    root: PathBuf,
    patient_info_dir: PathBuf,
    plots_dir: PathBuf,
    summaries_generated: AtomicUsize,
    plots_generated: AtomicUsize,
}

impl CacheManager {
    pub fn new(table: Arc<PatientTable>, cache_dir: impl Into<PathBuf>) -> Self {
        let root = cache_dir.into();
        Self {
            table,
            patient_info_dir: root.join(PATIENT_INFO_DIR),
            plots_dir: root.join(PLOTS_DIR),
            root,
            summaries_generated: AtomicUsize::new(0),
            plots_generated: AtomicUsize::new(0),
        }
    }

    pub fn table(&self) -> &Arc<PatientTable> {
        &self.table
    }

    /// Number of patients that can be requested.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.root
    }

    pub fn summary_path(&self, index: usize) -> PathBuf {
        self.patient_info_dir.join(format!("{index}.json"))
    }

    pub fn plot_path(&self, index: usize, side: EarSide) -> PathBuf {
        self.plots_dir
            .join(format!("{index}-{}.png", side.file_suffix()))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            plots_generated: self.plots_generated.load(Ordering::Relaxed),
        }
    }

    /// Summary of patient `index`, read back from the cache file.
    pub fn get_summary(&self, index: usize) -> Result<PatientSummary> {
        self.table.get(index)?;
        let path = self.summary_path(index);
        if path.is_file() {
            log::debug!("summary cache hit for patient {index}");
        } else {
            self.cache_summary(index, &path)?;
        }
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Chart files of patient `index`, rendering whichever are missing.
    pub fn get_plots(&self, index: usize) -> Result<PlotPaths> {
        self.table.get(index)?;
        let paths = PlotPaths {
            left: self.plot_path(index, EarSide::Left),
            right: self.plot_path(index, EarSide::Right),
        };
        for side in EarSide::ALL {
            let path = paths.get(side);
            if path.is_file() {
                log::debug!("plot cache hit for patient {index} ({side})");
            } else {
                self.cache_plot(index, side, path)?;
            }
        }
        Ok(paths)
    }

    /// Populate every entry up front.
    pub fn cache_all(&self) -> Result<()> {
        let n = self.len();
        for index in 0..n {
            log::info!("caching {index}/{n}");
            self.get_summary(index)?;
            self.get_plots(index)?;
        }
        Ok(())
    }

    /// Remove the whole cache directory.  A missing directory is fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                log::info!("Cleared cache at {}", self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn cache_summary(&self, index: usize, path: &Path) -> Result<()> {
        let record = self.table.get(index)?;
        fs::create_dir_all(&self.patient_info_dir)?;
        let summary = PatientSummary::from_record(index, record);
        write_atomic(&self.patient_info_dir, path, serde_json::to_string_pretty(&summary)?.as_bytes())?;
        self.summaries_generated.fetch_add(1, Ordering::Relaxed);
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    fn cache_plot(&self, index: usize, side: EarSide, path: &Path) -> Result<()> {
        let record = self.table.get(index)?;
        fs::create_dir_all(&self.plots_dir)?;
        let png = render::encode_png(&render::render_audiogram(&record.audiogram, side)?)?;
        write_atomic(&self.plots_dir, path, &png)?;
        self.plots_generated.fetch_add(1, Ordering::Relaxed);
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

/// Write `bytes` to a temporary file in `dir`, then rename it onto `path`.
/// Readers only ever observe a missing file or a complete one.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Audiogram, PatientRecord, ThresholdSeries};
    use crate::error::AudiogramError;

    fn table() -> Arc<PatientTable> {
        let rec = |sex: &str, age, acr: Vec<i32>| PatientRecord {
            sex: sex.to_string(),
            age,
            audiogram: Audiogram {
                ac_left: ThresholdSeries::unflagged(vec![15, 15, 20, 25, 30, 35]),
                ac_right: ThresholdSeries::unflagged(acr),
                bc_left: ThresholdSeries::unflagged(vec![10, 10, 15, 20, 25]),
                bc_right: ThresholdSeries::unflagged(vec![10, 15, 20, 25, 30]),
            },
        };
        Arc::new(
            PatientTable::from_records(vec![
                rec("F", 48, vec![20, 25, 30, 35, 40, 45]),
                rec("M", 66, vec![40, 45, 50, 55, 60, 65]),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn summary_is_generated_once_then_served_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(table(), dir.path().join("cache"));

        let first = cache.get_summary(0).unwrap();
        let second = cache.get_summary(0).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.pta_right, "32.5");
        assert_eq!(cache.stats().summaries_generated, 1);
        assert!(cache.summary_path(0).is_file());
    }

    #[test]
    fn existing_cache_file_is_not_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(table(), dir.path());

        let mut summary = cache.get_summary(1).unwrap();
        summary.sex = "edited".into();
        fs::write(
            cache.summary_path(1),
            serde_json::to_string_pretty(&summary).unwrap(),
        )
        .unwrap();

        assert_eq!(cache.get_summary(1).unwrap().sex, "edited");
        assert_eq!(cache.stats().summaries_generated, 1);
    }

    #[test]
    fn summary_file_uses_readable_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(table(), dir.path());
        cache.get_summary(0).unwrap();

        let text = fs::read_to_string(dir.path().join("patient_info/0.json")).unwrap();
        assert!(text.contains("\"PTA (R)\": \"32.5\""), "{text}");
        assert!(text.starts_with("{\n  \"Patient-ID\": 0"), "{text}");
    }

    #[test]
    fn plots_are_named_by_index_and_side() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(table(), dir.path());

        let paths = cache.get_plots(1).unwrap();
        assert_eq!(paths.left, dir.path().join("plots/1-left.png"));
        assert_eq!(paths.right, dir.path().join("plots/1-right.png"));
        assert!(paths.left.is_file() && paths.right.is_file());

        cache.get_plots(1).unwrap();
        assert_eq!(cache.stats().plots_generated, 2);
    }

    #[test]
    fn out_of_range_index_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(table(), dir.path().join("cache"));

        assert!(matches!(
            cache.get_summary(2),
            Err(AudiogramError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            cache.get_plots(5),
            Err(AudiogramError::IndexOutOfRange { index: 5, len: 2 })
        ));
        assert!(!dir.path().join("cache").exists());
    }

    #[test]
    fn concurrent_first_requests_never_see_partial_files() {
        let records: Vec<PatientRecord> = table().records().iter().cycle().take(48).cloned().collect();
        let table = Arc::new(PatientTable::from_records(records).unwrap());

        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let cache = CacheManager::new(table.clone(), dir.path());
            let failures = std::sync::atomic::AtomicUsize::new(0);

            std::thread::scope(|scope| {
                for _ in 0..8 {
                    scope.spawn(|| {
                        for i in 0..cache.len() {
                            if cache.get_summary(i).is_err() {
                                failures.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    });
                }
            });

            assert_eq!(failures.load(Ordering::Relaxed), 0);
            assert_eq!(cache.get_summary(1).unwrap().pta_right, "52.5");
            let leftovers: Vec<_> = fs::read_dir(dir.path().join("patient_info"))
                .unwrap()
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .filter(|name| !name.ends_with(".json"))
                .collect();
            assert!(leftovers.is_empty(), "{leftovers:?}");
        }
    }

    #[test]
    fn clear_removes_everything_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(table(), dir.path().join("cache"));
        cache.clear().unwrap();

        cache.get_summary(0).unwrap();
        cache.clear().unwrap();
        assert!(!cache.cache_dir().exists());

        cache.get_summary(0).unwrap();
        assert_eq!(cache.stats().summaries_generated, 2);
    }
}
