use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, UInt16Type, UInt32Type,
    UInt64Type,
};
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::cleaner::{clean_count, clean_region, parse_year};
use super::model::{DivorceDataset, LoadReport, Record};
use super::schema::SchemaConfig;
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Text encoding of delimited sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// UTF-8, falling back to Latin-1 when the bytes are not valid UTF-8.
    #[default]
    Auto,
    Utf8,
    Latin1,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub encoding: Encoding,
    pub schema: SchemaConfig,
}

// ---------------------------------------------------------------------------
// RawTable – header + string cells, before any typing
// ---------------------------------------------------------------------------

/// A source table as strings. Missing cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt`          – delimited text, `,` or `;`
/// * `.xlsx` / `.xls` / `.xlsb` / `.ods` – first worksheet
/// * `.parquet` / `.pq`       – flat columns
/// * `.json`                  – `[{ "Kabupaten/Kota": "...", ... }, ...]`
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<DivorceDataset, LoadError> {
    let raw = read_raw_table(path, options.encoding)?;
    info!(
        "read {} rows x {} columns from {}",
        raw.rows.len(),
        raw.headers.len(),
        path.display()
    );
    build_dataset(raw, &options.schema)
}

/// Read a file into a [`RawTable`] without interpreting any column.
pub fn read_raw_table(path: &Path, encoding: Encoding) -> Result<RawTable, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" | "txt" => read_csv(path, encoding),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_spreadsheet(path),
        "parquet" | "pq" => read_parquet(path),
        "json" => read_json(path),
        other => Err(LoadError::UnsupportedFormat(other.to_string())),
    }
}

/// Type and clean a raw table according to `config`.
///
/// Rows with a blank region or an unparseable year are dropped and counted
/// in the dataset's [`LoadReport`].
pub fn build_dataset(raw: RawTable, config: &SchemaConfig) -> Result<DivorceDataset, LoadError> {
    let RawTable { headers, rows } = raw;
    let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::EmptyInput);
    }
    let schema = config.resolve(&headers)?;

    let mut report = LoadReport {
        total_rows: rows.len(),
        ..LoadReport::default()
    };
    let mut records = Vec::with_capacity(rows.len());

    for (row_no, mut cells) in rows.into_iter().enumerate() {
        cells.resize(headers.len(), String::new());

        let Some(region) = clean_region(&cells[schema.region.index]) else {
            debug!("row {row_no}: missing region, dropped");
            report.dropped_missing_region += 1;
            continue;
        };
        let Some(year) = parse_year(&cells[schema.year.index]) else {
            debug!(
                "row {row_no}: invalid year '{}', dropped",
                cells[schema.year.index]
            );
            report.dropped_invalid_year += 1;
            continue;
        };

        let factors = schema
            .factors
            .iter()
            .map(|f| clean_count(&cells[f.index]))
            .collect();
        let record = Record {
            region,
            year,
            marriages: clean_count(&cells[schema.marriages.index]),
            factors,
            divorce_total: clean_count(&cells[schema.total.index]),
            raw: cells,
        };
        if record.factor_sum() != record.divorce_total {
            report.mismatched_totals += 1;
        }
        records.push(record);
    }
    report.kept_rows = records.len();

    info!("{report}");
    if report.mismatched_totals > 0 {
        warn!(
            "{} rows report a total that differs from the sum of their factors; totals kept as published",
            report.mismatched_totals
        );
    }

    Ok(DivorceDataset::from_records(schema, headers, records, report))
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

fn read_csv(path: &Path, encoding: Encoding) -> Result<RawTable, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
    let text = decode(bytes, encoding);
    parse_csv_text(&text)
}

/// Parse delimited text. The delimiter is `;` when the header line holds
/// more semicolons than commas, `,` otherwise.
pub fn parse_csv_text(text: &str) -> Result<RawTable, LoadError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_line = text.lines().next().unwrap_or("");
    let delimiter = if first_line.matches(';').count() > first_line.matches(',').count() {
        b';'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable { headers, rows })
}

fn decode(bytes: Vec<u8>, encoding: Encoding) -> String {
    match encoding {
        Encoding::Latin1 => latin1(&bytes),
        Encoding::Utf8 => String::from_utf8_lossy(&bytes).into_owned(),
        Encoding::Auto => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                debug!("input is not valid UTF-8, decoding as Latin-1");
                latin1(err.as_bytes())
            }
        },
    }
}

/// Latin-1 maps every byte to the code point of the same value.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

// ---------------------------------------------------------------------------
// Spreadsheet reader
// ---------------------------------------------------------------------------

/// Read the first worksheet; its first row is the header.
fn read_spreadsheet(path: &Path) -> Result<RawTable, LoadError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names().to_vec();
    let Some(sheet) = sheet_names.first() else {
        return Err(LoadError::Spreadsheet("workbook has no sheets".to_string()));
    };
    debug!("reading sheet '{sheet}' (first of {})", sheet_names.len());

    let range = workbook.worksheet_range(sheet)?;
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(LoadError::EmptyInput)?
        .iter()
        .map(|cell| spreadsheet_cell(cell).trim().to_string())
        .collect();

    let rows = rows
        .map(|row| row.iter().map(spreadsheet_cell).collect())
        .collect();
    Ok(RawTable { headers, rows })
}

fn spreadsheet_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

fn read_parquet(path: &Path) -> Result<RawTable, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().trim().to_string())
        .collect();
    let reader = builder.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| arrow_cell(col, row))
                    .collect(),
            );
        }
    }
    Ok(RawTable { headers, rows })
}

/// Render a single Arrow cell the way a text source would spell it.
fn arrow_cell(col: &ArrayRef, row: usize) -> String {
    if col.is_null(row) {
        return String::new();
    }
    match col.data_type() {
        DataType::Utf8 => col.as_string::<i32>().value(row).to_string(),
        DataType::LargeUtf8 => col.as_string::<i64>().value(row).to_string(),
        DataType::Int16 => col.as_primitive::<Int16Type>().value(row).to_string(),
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row).to_string(),
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row).to_string(),
        DataType::UInt16 => col.as_primitive::<UInt16Type>().value(row).to_string(),
        DataType::UInt32 => col.as_primitive::<UInt32Type>().value(row).to_string(),
        DataType::UInt64 => col.as_primitive::<UInt64Type>().value(row).to_string(),
        DataType::Float32 => format_float(f64::from(col.as_primitive::<Float32Type>().value(row))),
        DataType::Float64 => format_float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => col.as_boolean().value(row).to_string(),
        _ => arrow::util::display::array_value_to_string(col, row).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// JSON reader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, as written by `df.to_json(orient='records')`.
/// Headers are the union of keys in first-seen order.
fn read_json(path: &Path) -> Result<RawTable, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    parse_json_text(&text)
}

pub fn parse_json_text(text: &str) -> Result<RawTable, LoadError> {
    let root: JsonValue = serde_json::from_str(text)?;
    let records = root
        .as_array()
        .ok_or_else(|| LoadError::JsonLayout("expected top-level array".to_string()))?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| LoadError::JsonLayout(format!("row {i} is not an object")))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map(json_cell).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(RawTable {
        headers: headers.iter().map(|h| h.trim().to_string()).collect(),
        rows,
    })
}

fn json_cell(val: &JsonValue) -> String {
    match val {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                n.as_f64().map(format_float).unwrap_or_else(|| n.to_string())
            }
        }
        JsonValue::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Integral floats print without a fractional part so they clean to the
/// same count as their integer spelling.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "Kabupaten/Kota,Fakor Perceraian - Zina,Fakor Perceraian - Ekonomi,Fakor Perceraian - Jumlah,Nikah,Tahun";

    fn load(text: &str) -> Result<DivorceDataset, LoadError> {
        build_dataset(parse_csv_text(text)?, &SchemaConfig::default())
    }

    #[test]
    fn test_csv_basic() {
        let text = format!("{HEADER}\nKota Malang,3,10,13,1.200,2022\nKab. Jember,1,-,40,950,2023\n");
        let ds = load(&text).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].region, "Kota Malang");
        assert_eq!(ds.records[0].marriages, 1200);
        assert_eq!(ds.records[0].factors, vec![3, 10]);
        assert_eq!(ds.records[1].factors, vec![1, 0]);
        assert_eq!(ds.records[1].divorce_total, 40);
        assert_eq!(ds.years.iter().copied().collect::<Vec<_>>(), vec![2022, 2023]);
        assert_eq!(ds.report.mismatched_totals, 1);
    }

    #[test]
    fn test_oversized_counts_saturate() {
        let big = "99999999999999999999999";
        let text = format!("{HEADER}\nA,{big},{big},1,10,2022\n");
        let ds = load(&text).unwrap();

        assert_eq!(ds.records[0].factors, vec![u64::MAX, u64::MAX]);
        assert_eq!(ds.records[0].factor_sum(), u64::MAX);
        assert_eq!(ds.report.mismatched_totals, 1);
    }

    #[test]
    fn test_headers_are_trimmed() {
        let text = " Kabupaten/Kota , Fakor Perceraian - Zina ,Fakor Perceraian - Jumlah, Nikah ,Tahun \nA,1,1,5,2022\n";
        let ds = load(text).unwrap();
        assert_eq!(ds.headers[0], "Kabupaten/Kota");
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_rows_without_keys_are_dropped() {
        let text = format!("{HEADER}\n,1,1,2,10,2022\nA,1,1,2,10,\nB,1,1,2,10,abc\nC,1,1,2,10,2022\n");
        let ds = load(&text).unwrap();

        assert_eq!(ds.len(), 1);
        assert_eq!(ds.report.total_rows, 4);
        assert_eq!(ds.report.dropped_missing_region, 1);
        assert_eq!(ds.report.dropped_invalid_year, 2);
        assert_eq!(ds.report.kept_rows, 1);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let text = format!("{HEADER}\nA,1,2,3,10,2022\nB,4\n");
        let ds = load(&text).unwrap();
        // B has no year once padded, so it is dropped rather than panicking.
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.report.dropped_invalid_year, 1);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let text = "Kabupaten/Kota;Fakor Perceraian - Zina;Fakor Perceraian - Jumlah;Nikah;Tahun\nA;1.000;1.000;2.000;2024\n";
        let ds = load(text).unwrap();
        assert_eq!(ds.records[0].factors, vec![1000]);
        assert_eq!(ds.records[0].marriages, 2000);
    }

    #[test]
    fn test_latin1_fallback() {
        let mut bytes = format!("{HEADER}\n").into_bytes();
        bytes.extend_from_slice(b"Kab. P\xe9ngaron,1,1,2,10,2022\n");
        let text = decode(bytes, Encoding::Auto);
        let ds = build_dataset(parse_csv_text(&text).unwrap(), &SchemaConfig::default()).unwrap();
        assert_eq!(ds.records[0].region, "Kab. P\u{e9}ngaron");
    }

    #[test]
    fn test_empty_input() {
        let err = load("").unwrap_err();
        assert!(matches!(err, LoadError::EmptyInput), "got {err:?}");
    }

    #[test]
    fn test_missing_column_is_load_error() {
        let err = load("Kabupaten/Kota,Tahun\nA,2022\n").unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_raw_table(Path::new("data.sav"), Encoding::Auto).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ref e) if e == "sav"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_raw_table(Path::new("/nonexistent/data.csv"), Encoding::Auto).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_json_records() {
        let text = r#"[
            {"Kabupaten/Kota": "A", "Fakor Perceraian - Zina": 2, "Fakor Perceraian - Jumlah": 2.0, "Nikah": "1.500", "Tahun": 2022},
            {"Kabupaten/Kota": "B", "Fakor Perceraian - Zina": null, "Fakor Perceraian - Jumlah": 0, "Nikah": 10, "Tahun": 2023.0}
        ]"#;
        let raw = parse_json_text(text).unwrap();
        assert_eq!(raw.headers[1], "Fakor Perceraian - Zina");

        let ds = build_dataset(raw, &SchemaConfig::default()).unwrap();
        assert_eq!(ds.records[0].divorce_total, 2);
        assert_eq!(ds.records[0].marriages, 1500);
        assert_eq!(ds.records[1].year, 2023);
        assert_eq!(ds.records[1].factors, vec![0]);
    }

    #[test]
    fn test_json_must_be_array() {
        let err = parse_json_text(r#"{"a": 1}"#).unwrap_err();
        assert!(matches!(err, LoadError::JsonLayout(_)));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(2022.0), "2022");
        assert_eq!(format_float(1.5), "1.5");
    }
}
