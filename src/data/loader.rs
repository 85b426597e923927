use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, BooleanArray, Int32Array, Int64Array, LargeListArray, LargeStringArray, ListArray,
    StringArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use super::model::{Audiogram, Conduction, EarSide, PatientRecord, PatientTable, ThresholdSeries};
use crate::error::{AudiogramError, Result};

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Compression wrapped around an archive payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Xz,
    Gzip,
    None,
}

impl Compression {
    /// Detect compression from magic bytes.
    pub fn detect(data: &[u8]) -> Self {
        match infer::get(data).map(|kind| kind.mime_type()) {
            Some("application/x-xz") => Compression::Xz,
            Some("application/gzip") => Compression::Gzip,
            _ => Compression::None,
        }
    }
}

/// Load the patient table from an archive on disk.
///
/// The archive is an xz- or gzip-compressed (or plain) payload holding
/// either a Parquet file or a column-oriented JSON document:
///
/// ```json
/// {
///   "sex": ["F", "M", ...],
///   "age": [57, 63, ...],
///   "gram_info": [
///     { "acl": [..6], "acl_masked": [..6], "acl_noresp": [..6],
///       "acr": .., "bcl": [..5], "bcr": [..5], ... },
///     ...
///   ]
/// }
/// ```
pub fn load_archive(path: &Path) -> Result<PatientTable> {
    let raw = std::fs::read(path).map_err(|e| {
        AudiogramError::Archive(format!("reading {}: {e}", path.display()))
    })?;
    let table = load_bytes(&raw)?;
    log::info!(
        "Loaded {} patient records from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

/// Decode an archive already read into memory.
pub fn load_bytes(raw: &[u8]) -> Result<PatientTable> {
    let payload = decompress(raw)?;
    if payload.starts_with(PARQUET_MAGIC) {
        load_parquet(payload)
    } else {
        load_json(&payload)
    }
}

/// Write `table` as a column-oriented JSON archive.
pub fn write_json_archive(table: &PatientTable, path: &Path, compression: Compression) -> Result<()> {
    let json = serde_json::to_vec(&ArchiveJson::from_table(table))?;
    let file = std::fs::File::create(path)?;
    match compression {
        Compression::Xz => {
            let mut enc = XzEncoder::new(file, 6);
            enc.write_all(&json)?;
            enc.finish()?;
        }
        Compression::Gzip => {
            let mut enc = GzEncoder::new(file, flate2::Compression::default());
            enc.write_all(&json)?;
            enc.finish()?;
        }
        Compression::None => {
            let mut file = file;
            file.write_all(&json)?;
        }
    }
    Ok(())
}

fn decompress(raw: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match Compression::detect(raw) {
        Compression::Xz => {
            XzDecoder::new(raw)
                .read_to_end(&mut out)
                .map_err(|e| AudiogramError::Archive(format!("decompressing xz: {e}")))?;
        }
        Compression::Gzip => {
            GzDecoder::new(raw)
                .read_to_end(&mut out)
                .map_err(|e| AudiogramError::Archive(format!("decompressing gzip: {e}")))?;
        }
        Compression::None => out.extend_from_slice(raw),
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// JSON payload
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveJson {
    sex: Vec<String>,
    age: Vec<i64>,
    gram_info: Vec<GramInfoJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GramInfoJson {
    acl: Vec<i32>,
    acl_masked: Vec<bool>,
    acl_noresp: Vec<bool>,
    acr: Vec<i32>,
    acr_masked: Vec<bool>,
    acr_noresp: Vec<bool>,
    bcl: Vec<i32>,
    bcl_masked: Vec<bool>,
    bcl_noresp: Vec<bool>,
    bcr: Vec<i32>,
    bcr_masked: Vec<bool>,
    bcr_noresp: Vec<bool>,
}

impl GramInfoJson {
    fn into_audiogram(self) -> Audiogram {
        Audiogram {
            ac_left: ThresholdSeries::new(self.acl, self.acl_masked, self.acl_noresp),
            ac_right: ThresholdSeries::new(self.acr, self.acr_masked, self.acr_noresp),
            bc_left: ThresholdSeries::new(self.bcl, self.bcl_masked, self.bcl_noresp),
            bc_right: ThresholdSeries::new(self.bcr, self.bcr_masked, self.bcr_noresp),
        }
    }

    fn from_audiogram(gram: &Audiogram) -> Self {
        let s = |c: Conduction, e: EarSide| gram.series(c, e).clone();
        let (acl, acr) = (s(Conduction::Air, EarSide::Left), s(Conduction::Air, EarSide::Right));
        let (bcl, bcr) = (s(Conduction::Bone, EarSide::Left), s(Conduction::Bone, EarSide::Right));
        Self {
            acl: acl.values,
            acl_masked: acl.masked,
            acl_noresp: acl.no_response,
            acr: acr.values,
            acr_masked: acr.masked,
            acr_noresp: acr.no_response,
            bcl: bcl.values,
            bcl_masked: bcl.masked,
            bcl_noresp: bcl.no_response,
            bcr: bcr.values,
            bcr_masked: bcr.masked,
            bcr_noresp: bcr.no_response,
        }
    }
}

impl ArchiveJson {
    fn from_table(table: &PatientTable) -> Self {
        let records = table.records();
        Self {
            sex: records.iter().map(|r| r.sex.clone()).collect(),
            age: records.iter().map(|r| r.age).collect(),
            gram_info: records
                .iter()
                .map(|r| GramInfoJson::from_audiogram(&r.audiogram))
                .collect(),
        }
    }
}

fn load_json(payload: &[u8]) -> Result<PatientTable> {
    let archive: ArchiveJson = serde_json::from_slice(payload)
        .map_err(|e| AudiogramError::Schema(format!("parsing JSON archive: {e}")))?;

    let n = archive.age.len();
    if archive.sex.len() != n || archive.gram_info.len() != n {
        return Err(AudiogramError::Schema(format!(
            "column lengths differ: sex={}, age={}, gram_info={}",
            archive.sex.len(),
            n,
            archive.gram_info.len()
        )));
    }

    let records = archive
        .sex
        .into_iter()
        .zip(archive.age)
        .zip(archive.gram_info)
        .map(|((sex, age), gram)| PatientRecord {
            sex,
            age,
            audiogram: gram.into_audiogram(),
        })
        .collect();

    PatientTable::from_records(records)
}

// ---------------------------------------------------------------------------
// Parquet payload
// ---------------------------------------------------------------------------

/// Expected schema, one row per patient:
/// - `sex`: Utf8 / LargeUtf8
/// - `age`: Int32 / Int64
/// - `acl`, `acr`, `bcl`, `bcr`: List<Int32|Int64> thresholds
/// - the same names with `_masked` / `_noresp`: List<Boolean> flags
fn load_parquet(payload: Vec<u8>) -> Result<PatientTable> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(payload))?;
    let reader = builder.build()?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        for row in 0..batch.num_rows() {
            let rec = parquet_row(&batch, row)
                .map_err(|e| AudiogramError::Schema(format!("row {}: {e}", records.len())))?;
            records.push(rec);
        }
    }

    PatientTable::from_records(records)
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Arc<dyn Array>> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| AudiogramError::Schema(format!("parquet file missing '{name}' column")))?;
    Ok(batch.column(idx))
}

fn parquet_row(batch: &RecordBatch, row: usize) -> Result<PatientRecord> {
    let sex = extract_string(column(batch, "sex")?, row)?;
    let age = extract_i64(column(batch, "age")?, row)?;

    let mut audiogram = Audiogram::default();
    for conduction in Conduction::ALL {
        for side in EarSide::ALL {
            let key = conduction.key(side);
            *audiogram.series_mut(conduction, side) = ThresholdSeries::new(
                extract_i32_list(column(batch, &key)?, row)?,
                extract_bool_list(column(batch, &format!("{key}_masked"))?, row)?,
                extract_bool_list(column(batch, &format!("{key}_noresp"))?, row)?,
            );
        }
    }

    Ok(PatientRecord {
        sex,
        age,
        audiogram,
    })
}

// -- Arrow helpers --

/// The inner array of a List or LargeList column at the given row.
fn list_values(col: &Arc<dyn Array>, row: usize) -> Result<Arc<dyn Array>> {
    if col.is_null(row) {
        return Err(AudiogramError::Schema("null value in list column".into()));
    }
    match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .map(|arr| arr.value(row))
            .ok_or_else(|| AudiogramError::Schema("expected ListArray".into())),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .map(|arr| arr.value(row))
            .ok_or_else(|| AudiogramError::Schema("expected LargeListArray".into())),
        other => Err(AudiogramError::Schema(format!(
            "expected List or LargeList column, got {other:?}"
        ))),
    }
}

fn extract_i32_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<i32>> {
    let values = list_values(col, row)?;
    let missing = || AudiogramError::Schema("null threshold".into());

    if let Some(arr) = values.as_any().downcast_ref::<Int32Array>() {
        arr.iter().map(|v| v.ok_or_else(missing)).collect()
    } else if let Some(arr) = values.as_any().downcast_ref::<Int64Array>() {
        arr.iter()
            .map(|v| {
                let v = v.ok_or_else(missing)?;
                i32::try_from(v).map_err(|_| {
                    AudiogramError::Schema(format!("threshold {v} does not fit in 32 bits"))
                })
            })
            .collect()
    } else {
        Err(AudiogramError::Schema(format!(
            "threshold list inner type is {:?}, expected Int32 or Int64",
            values.data_type()
        )))
    }
}

fn extract_bool_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<bool>> {
    let values = list_values(col, row)?;
    let arr = values
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| {
            AudiogramError::Schema(format!(
                "flag list inner type is {:?}, expected Boolean",
                values.data_type()
            ))
        })?;
    arr.iter()
        .map(|v| v.ok_or_else(|| AudiogramError::Schema("null flag".into())))
        .collect()
}

fn extract_string(col: &Arc<dyn Array>, row: usize) -> Result<String> {
    if col.is_null(row) {
        return Err(AudiogramError::Schema("null string value".into()));
    }
    if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
        Ok(s.value(row).to_string())
    } else if let Some(s) = col.as_any().downcast_ref::<LargeStringArray>() {
        Ok(s.value(row).to_string())
    } else {
        Err(AudiogramError::Schema(format!(
            "expected Utf8 column, got {:?}",
            col.data_type()
        )))
    }
}

fn extract_i64(col: &Arc<dyn Array>, row: usize) -> Result<i64> {
    if col.is_null(row) {
        return Err(AudiogramError::Schema("null integer value".into()));
    }
    if let Some(arr) = col.as_any().downcast_ref::<Int64Array>() {
        Ok(arr.value(row))
    } else if let Some(arr) = col.as_any().downcast_ref::<Int32Array>() {
        Ok(arr.value(row) as i64)
    } else {
        Err(AudiogramError::Schema(format!(
            "expected Int32 or Int64 column, got {:?}",
            col.data_type()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use arrow::array::{BooleanBuilder, Int64Builder, ListBuilder};
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;

    fn sample_table() -> PatientTable {
        let gram = Audiogram {
            ac_left: ThresholdSeries::new(
                vec![10, 15, 20, 40, 60, 80],
                vec![false, false, false, true, true, false],
                vec![false, false, false, false, false, true],
            ),
            ac_right: ThresholdSeries::unflagged(vec![20, 25, 30, 35, 40, 45]),
            bc_left: ThresholdSeries::unflagged(vec![5, 10, 15, 35, 55]),
            bc_right: ThresholdSeries::unflagged(vec![15, 20, 25, 30, 35]),
        };
        PatientTable::from_records(vec![
            PatientRecord {
                sex: "F".into(),
                age: 71,
                audiogram: gram.clone(),
            },
            PatientRecord {
                sex: "M".into(),
                age: 34,
                audiogram: gram,
            },
        ])
        .unwrap()
    }

    #[test]
    fn xz_archive_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patients.json.xz");
        let table = sample_table();
        write_json_archive(&table, &path, Compression::Xz).unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(Compression::detect(&raw), Compression::Xz);

        let loaded = load_archive(&path).unwrap();
        assert_eq!(loaded.records(), table.records());
    }

    #[test]
    fn gzip_and_plain_payloads_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        for (name, compression) in [("a.json.gz", Compression::Gzip), ("a.json", Compression::None)] {
            let path = dir.path().join(name);
            write_json_archive(&sample_table(), &path, compression).unwrap();
            assert_eq!(load_archive(&path).unwrap().len(), 2);
        }
    }

    #[test]
    fn mismatched_columns_fail_fast() {
        let json = br#"{"sex": ["F"], "age": [1, 2], "gram_info": []}"#;
        let err = load_bytes(json).unwrap_err();
        assert!(matches!(err, AudiogramError::Schema(_)), "{err}");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(load_bytes(b"not an archive").is_err());
    }

    #[test]
    fn missing_file_is_an_archive_error() {
        let err = load_archive(Path::new("/nonexistent/archive.xz")).unwrap_err();
        assert!(matches!(err, AudiogramError::Archive(_)));
    }

    fn single_list<B: arrow::array::ArrayBuilder>(
        inner: B,
        fill: impl FnOnce(&mut B),
    ) -> Arc<dyn Array> {
        let mut list = ListBuilder::new(inner);
        fill(list.values());
        list.append(true);
        Arc::new(list.finish())
    }

    #[test]
    fn oversized_thresholds_are_rejected() {
        let col = single_list(Int64Builder::new(), |b| {
            b.append_value(20);
            b.append_value(1 << 40);
        });
        let err = extract_i32_list(&col, 0).unwrap_err();
        assert!(matches!(err, AudiogramError::Schema(_)), "{err}");

        let col = single_list(Int64Builder::new(), |b| b.append_value(-15));
        assert_eq!(extract_i32_list(&col, 0).unwrap(), vec![-15]);
    }

    #[test]
    fn nulls_are_schema_errors_in_every_column_kind() {
        let flags = single_list(BooleanBuilder::new(), |b| {
            b.append_value(true);
            b.append_null();
        });
        assert!(matches!(extract_bool_list(&flags, 0), Err(AudiogramError::Schema(_))));

        let thresholds = single_list(Int64Builder::new(), |b| b.append_null());
        assert!(matches!(extract_i32_list(&thresholds, 0), Err(AudiogramError::Schema(_))));

        let sex: Arc<dyn Array> = Arc::new(StringArray::from(vec![None::<&str>]));
        assert!(matches!(extract_string(&sex, 0), Err(AudiogramError::Schema(_))));
    }

    #[test]
    fn parquet_payload_loads() {
        let table = sample_table();
        let records = table.records();

        let mut fields = vec![
            Field::new("sex", DataType::Utf8, false),
            Field::new("age", DataType::Int64, false),
        ];
        let mut columns: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(
                records.iter().map(|r| r.sex.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(
                records.iter().map(|r| r.age).collect::<Vec<_>>(),
            )),
        ];

        for conduction in Conduction::ALL {
            for side in EarSide::ALL {
                let key = conduction.key(side);

                let mut values = ListBuilder::new(Int64Builder::new());
                let mut masked = ListBuilder::new(BooleanBuilder::new());
                let mut noresp = ListBuilder::new(BooleanBuilder::new());
                for rec in records {
                    let series = rec.audiogram.series(conduction, side);
                    for &v in &series.values {
                        values.values().append_value(v as i64);
                    }
                    values.append(true);
                    for &m in &series.masked {
                        masked.values().append_value(m);
                    }
                    masked.append(true);
                    for &n in &series.no_response {
                        noresp.values().append_value(n);
                    }
                    noresp.append(true);
                }

                let list_of = |dt| DataType::List(Arc::new(Field::new("item", dt, true)));
                fields.push(Field::new(&key, list_of(DataType::Int64), false));
                fields.push(Field::new(format!("{key}_masked"), list_of(DataType::Boolean), false));
                fields.push(Field::new(format!("{key}_noresp"), list_of(DataType::Boolean), false));
                columns.push(Arc::new(values.finish()));
                columns.push(Arc::new(masked.finish()));
                columns.push(Arc::new(noresp.finish()));
            }
        }

        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let loaded = load_bytes(&buf).unwrap();
        assert_eq!(loaded.records(), records);
    }
}
