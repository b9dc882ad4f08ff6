//! Writes a synthetic East Java marriage/divorce table in the published
//! layout, as `sample_data.csv` and `sample_data.parquet`.
//!
//! Usage: `generate_sample [OUTPUT_DIR]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int32Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const REGIONS: [&str; 12] = [
    "Kab. Pacitan",
    "Kab. Ponorogo",
    "Kab. Malang",
    "Kab. Jember",
    "Kab. Banyuwangi",
    "Kab. Sidoarjo",
    "Kab. Gresik",
    "Kab. Sumenep",
    "Kota Kediri",
    "Kota Blitar",
    "Kota Malang",
    "Kota Surabaya",
];

const YEARS: [i32; 3] = [2022, 2023, 2024];

/// Cause label and its share of a region's cases.
const FACTORS: [(&str, f64); 13] = [
    ("Zina", 0.02),
    ("Mabuk", 0.01),
    ("Madat", 0.005),
    ("Judi", 0.01),
    ("Meninggalkan Salah satu Pihak", 0.12),
    ("Dihukum Penjara", 0.005),
    ("Poligami", 0.005),
    ("Kekerasan Dalam Rumah Tangga", 0.03),
    ("Cacat Badan", 0.003),
    ("Perselisihan dan Pertengkaran Terus Menerus", 0.54),
    ("Kawin Paksa", 0.004),
    ("Murtad", 0.003),
    ("Ekonomi", 0.245),
];

const PREFIX: &str = "Fakor Perceraian";

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

    /// Uniform in `[lo, hi)`.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

struct Row {
    region: &'static str,
    year: i32,
    marriages: u64,
    factors: Vec<u64>,
}

impl Row {
    fn total(&self) -> u64 {
        self.factors.iter().sum()
    }
}

fn generate(rng: &mut SimpleRng) -> Vec<Row> {
    let mut rows = Vec::new();
    for region in REGIONS {
        let size = rng.uniform(3_000.0, 25_000.0);
        for (step, &year) in YEARS.iter().enumerate() {
            let marriages = (size * (1.0 - 0.03 * step as f64)).round() as u64;
            let cases = marriages as f64 * rng.uniform(0.12, 0.30);
            let factors = FACTORS
                .iter()
                .map(|&(_, share)| (cases * share * rng.uniform(0.7, 1.3)).round() as u64)
                .collect();
            rows.push(Row {
                region,
                year,
                marriages,
                factors,
            });
        }
    }
    rows
}

/// Render a count the way the published sheets do: dotted thousands,
/// and "-" for zero.
fn published_count(n: u64) -> String {
    if n == 0 {
        return "-".to_string();
    }
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

fn headers() -> Vec<String> {
    let mut headers = vec![
        "Kabupaten/Kota".to_string(),
        "Tahun".to_string(),
        "Nikah".to_string(),
    ];
    headers.extend(FACTORS.iter().map(|(name, _)| format!("{PREFIX} - {name}")));
    headers.push(format!("{PREFIX} - Jumlah"));
    headers
}

fn write_csv(rows: &[Row], path: &PathBuf) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(headers())?;
    for row in rows {
        let mut record = vec![
            row.region.to_string(),
            row.year.to_string(),
            published_count(row.marriages),
        ];
        record.extend(row.factors.iter().map(|&n| published_count(n)));
        record.push(published_count(row.total()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(rows: &[Row], path: &PathBuf) -> Result<()> {
    let headers = headers();
    let mut fields = vec![
        Field::new(&headers[0], DataType::Utf8, false),
        Field::new(&headers[1], DataType::Int32, false),
        Field::new(&headers[2], DataType::UInt64, false),
    ];
    fields.extend(
        headers[3..]
            .iter()
            .map(|h| Field::new(h, DataType::UInt64, false)),
    );
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.region).collect::<Vec<_>>(),
        )),
        Arc::new(Int32Array::from(
            rows.iter().map(|r| r.year).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            rows.iter().map(|r| r.marriages).collect::<Vec<_>>(),
        )),
    ];
    for i in 0..FACTORS.len() {
        columns.push(Arc::new(UInt64Array::from(
            rows.iter().map(|r| r.factors[i]).collect::<Vec<_>>(),
        )));
    }
    columns.push(Arc::new(UInt64Array::from(
        rows.iter().map(Row::total).collect::<Vec<_>>(),
    )));

    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let file =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let rows = generate(&mut rng);

    let csv_path = out_dir.join("sample_data.csv");
    let parquet_path = out_dir.join("sample_data.parquet");
    write_csv(&rows, &csv_path)?;
    write_parquet(&rows, &parquet_path)?;

    println!(
        "Wrote {} rows ({} regions x {} years) to {} and {}",
        rows.len(),
        REGIONS.len(),
        YEARS.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
