use std::path::PathBuf;

use clap::Parser;

use crate::annotation::DEFAULT_REVIEWERS;

/// Command-line / environment configuration for the annotator.
#[derive(Parser, Debug, Clone)]
#[command(name = "audiogram-annotator")]
#[command(about = "Review and annotate audiograms from an anonymised patient archive")]
#[command(version)]
pub struct Config {
    /// Compressed patient archive (xz, gzip or plain; JSON or Parquet)
    #[arg(short, long, default_value = "anonymized-data.json.xz", env = "AUDIOGRAM_ARCHIVE")]
    pub archive: PathBuf,

    /// Directory holding cached summaries and charts
    #[arg(long, default_value = "cache", env = "AUDIOGRAM_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Directory holding the annotation log
    #[arg(long, default_value = "annotation", env = "AUDIOGRAM_ANNOTATION_DIR")]
    pub annotation_dir: PathBuf,

    /// Keep the cache and annotation directories from a previous run
    #[arg(long)]
    pub keep_cache: bool,

    /// Render every patient into the cache, then exit
    #[arg(long)]
    pub cache_all: bool,

    /// Reviewer name offered in the drop-down (repeatable)
    #[arg(short, long = "reviewer")]
    pub reviewers: Vec<String>,
}

impl Config {
    /// Configured reviewers, or the built-in list when none were given.
    pub fn reviewer_names(&self) -> Vec<String> {
        if self.reviewers.is_empty() {
            DEFAULT_REVIEWERS.iter().map(|r| r.to_string()).collect()
        } else {
            self.reviewers.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["audiogram-annotator"]).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.annotation_dir, PathBuf::from("annotation"));
        assert!(!config.keep_cache && !config.cache_all);
        assert_eq!(
            config.reviewer_names(),
            ["Audiologist-A", "Audiologist-B", "Audiologist-C"]
        );
    }

    #[test]
    fn repeated_reviewers_replace_the_defaults() {
        let config = Config::try_parse_from([
            "audiogram-annotator",
            "--archive",
            "data.json.gz",
            "--reviewer",
            "Dr. Kim",
            "-r",
            "Dr. Osei",
            "--cache-all",
        ])
        .unwrap();
        assert_eq!(config.archive, PathBuf::from("data.json.gz"));
        assert_eq!(config.reviewer_names(), ["Dr. Kim", "Dr. Osei"]);
        assert!(config.cache_all);
    }
}
