//! Audiogram annotation toolkit: archive loading, patient summaries,
//! audiogram charts, an on-disk cache over both, and the annotation log.

pub mod annotation;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod render;

pub use annotation::{Annotation, AnnotationLog, EarJudgment, LogEntry};
pub use cache::{CacheManager, CacheStats, PlotPaths};
pub use config::Config;
pub use data::model::{Audiogram, EarSide, PatientRecord, PatientTable, ThresholdSeries};
pub use data::summary::PatientSummary;
pub use error::{AudiogramError, Result};
