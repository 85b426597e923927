use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BooleanBuilder, Int32Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

use audiogram_annotator::data::loader::{self, Compression};
use audiogram_annotator::data::model::{
    Audiogram, Conduction, EarSide, PatientRecord, PatientTable, ThresholdSeries,
};

/// Write a synthetic, anonymised patient archive for trying the annotator.
#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
struct Args {
    /// Number of patients
    #[arg(short = 'n', long, default_value_t = 200)]
    count: usize,

    /// PRNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output file [default: anonymized-data.json.xz, or
    /// anonymized-data.parquet with --parquet]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a Parquet table instead of xz-compressed JSON
    #[arg(long)]
    parquet: bool,
}

impl Args {
    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let name = if self.parquet {
                "anonymized-data.parquet"
            } else {
                "anonymized-data.json.xz"
            };
            PathBuf::from(name)
        })
    }
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next_f64() * (hi - lo + 1) as f64) as i64
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// Audiometers step in 5 dB and stop at 120 dB HL.
const MAX_LEVEL: i32 = 120;

fn quantise(db: f64) -> i32 {
    ((db / 5.0).round() as i32 * 5).clamp(-10, MAX_LEVEL)
}

/// Air and bone thresholds of one ear: a base level, a high-frequency
/// slope and, for conductive losses, an air-bone gap.
fn ear(rng: &mut SimpleRng, age: i64) -> (ThresholdSeries, ThresholdSeries) {
    let base = rng.gauss(10.0 + (age as f64 - 20.0).max(0.0) * 0.4, 15.0).max(-5.0);
    let slope = rng.gauss(6.0, 5.0).max(0.0);
    let gap = if rng.chance(0.3) { rng.gauss(25.0, 8.0).max(10.0) } else { 0.0 };

    let mut bone = Vec::new();
    let mut air = Vec::new();
    for slot in 0..Conduction::Air.point_count() {
        let sensorineural = base + slope * slot as f64 + rng.gauss(0.0, 4.0);
        air.push(quantise(sensorineural + gap));
        if slot < Conduction::Bone.point_count() {
            bone.push(quantise(sensorineural).min(70));
        }
    }

    let flags = |rng: &mut SimpleRng, values: &[i32], cap: i32| {
        let masked: Vec<bool> = values.iter().map(|_| rng.chance(0.2)).collect();
        let noresp: Vec<bool> = values.iter().map(|&v| v >= cap).collect();
        (masked, noresp)
    };
    let (air_masked, air_noresp) = flags(rng, &air, MAX_LEVEL);
    let (bone_masked, bone_noresp) = flags(rng, &bone, 70);

    (
        ThresholdSeries::new(air, air_masked, air_noresp),
        ThresholdSeries::new(bone, bone_masked, bone_noresp),
    )
}

fn generate(count: usize, seed: u64) -> Result<PatientTable> {
    let mut rng = SimpleRng::new(seed);
    let records = (0..count)
        .map(|_| {
            let age = rng.range(18, 92);
            let sex = if rng.chance(0.5) { "F" } else { "M" }.to_string();
            let mut audiogram = Audiogram::default();
            for side in EarSide::ALL {
                let (air, bone) = ear(&mut rng, age);
                *audiogram.series_mut(Conduction::Air, side) = air;
                *audiogram.series_mut(Conduction::Bone, side) = bone;
            }
            PatientRecord { sex, age, audiogram }
        })
        .collect();
    Ok(PatientTable::from_records(records)?)
}

fn write_parquet(table: &PatientTable, path: &Path) -> Result<()> {
    let records = table.records();
    let list_of = |dt| DataType::List(Arc::new(Field::new("item", dt, true)));

    let mut fields = vec![
        Field::new("sex", DataType::Utf8, false),
        Field::new("age", DataType::Int64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
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
            let mut values = ListBuilder::new(Int32Builder::new());
            let mut masked = ListBuilder::new(BooleanBuilder::new());
            let mut noresp = ListBuilder::new(BooleanBuilder::new());
            for record in records {
                let series = record.audiogram.series(conduction, side);
                values.values().append_slice(&series.values);
                values.append(true);
                masked.values().append_slice(&series.masked);
                masked.append(true);
                noresp.values().append_slice(&series.no_response);
                noresp.append(true);
            }
            fields.push(Field::new(&key, list_of(DataType::Int32), false));
            fields.push(Field::new(format!("{key}_masked"), list_of(DataType::Boolean), false));
            fields.push(Field::new(format!("{key}_noresp"), list_of(DataType::Boolean), false));
            columns.push(Arc::new(values.finish()));
            columns.push(Arc::new(masked.finish()));
            columns.push(Arc::new(noresp.finish()));
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns)
        .context("Failed to create RecordBatch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let output = args.output_path();
    let table = generate(args.count, args.seed)?;
    if args.parquet {
        write_parquet(&table, &output)?;
    } else {
        loader::write_json_archive(&table, &output, Compression::Xz)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    println!("Wrote {} patients to {}", table.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_name_follows_the_format() {
        let json = Args::parse_from(["generate_sample"]);
        assert_eq!(json.output_path(), PathBuf::from("anonymized-data.json.xz"));

        let parquet = Args::parse_from(["generate_sample", "--parquet"]);
        assert_eq!(parquet.output_path(), PathBuf::from("anonymized-data.parquet"));

        let explicit = Args::parse_from(["generate_sample", "--parquet", "-o", "x.pq"]);
        assert_eq!(explicit.output_path(), PathBuf::from("x.pq"));
    }

    #[test]
    fn parquet_output_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.parquet");
        let table = generate(12, 7).unwrap();
        write_parquet(&table, &path).unwrap();

        let loaded = loader::load_archive(&path).unwrap();
        assert_eq!(loaded.len(), 12);
        assert_eq!(loaded.records()[3].audiogram, table.records()[3].audiogram);
    }
}
