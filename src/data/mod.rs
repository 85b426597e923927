/// Data layer: core types, archive loading, and summaries.
///
/// Architecture:
/// ```text
///  .json.xz / .json.gz / .parquet.xz / ...
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  decompress + parse → PatientTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ PatientTable  │  Vec<PatientRecord>, dense indices
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ summary   │  record → PatientSummary (thresholds, PTA)
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod summary;
