//! Local-directory data source for the six Andina datasets.
//!
//! Each table is read from `<dir>/<table>_andina.json` (an array of records)
//! or, failing that, `<dir>/<table>_andina.csv`. CSV files use `,` as the
//! delimiter and `.` as the decimal separator, except the imports export,
//! which uses `;` and `,`.

use std::path::{Path, PathBuf};

use andina_core::coercion::DecimalNormalizer;
use andina_core::error::{AndinaError, Result};
use andina_core::models::{Table, TableKey, TableSet, Value};
use tracing::{debug, warn};

// ── DataSource ────────────────────────────────────────────────────────────────

/// Anything that can produce the raw table set.
///
/// Implementations must yield all six raw keys; a table that cannot be
/// loaded is returned empty rather than failing the whole load.
pub trait DataSource {
    fn load(&self) -> Result<TableSet>;

    /// Short human-readable origin, used in log messages.
    fn describe(&self) -> String;
}

// ── CSV conventions ───────────────────────────────────────────────────────────

/// Delimiter and decimal separator of a CSV export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvConvention {
    pub delimiter: u8,
    pub decimal_comma: bool,
}

impl CsvConvention {
    pub fn for_table(key: TableKey) -> Self {
        match key {
            TableKey::Importaciones => Self {
                delimiter: b';',
                decimal_comma: true,
            },
            _ => Self {
                delimiter: b',',
                decimal_comma: false,
            },
        }
    }

    /// Empty → null, numeric → number, anything else → text.
    pub fn parse_cell(&self, raw: &str) -> Value {
        let cell = raw.trim();
        if cell.is_empty() {
            return Value::Null;
        }
        // With a `.` decimal separator a comma can only be a thousands
        // separator or part of a label, so the cell stays text.
        if !self.decimal_comma && cell.contains(',') {
            return Value::Text(cell.to_string());
        }
        match DecimalNormalizer::parse_str(cell) {
            Some(n) => Value::Number(n),
            None => Value::Text(cell.to_string()),
        }
    }
}

// ── DirectorySource ───────────────────────────────────────────────────────────

/// Reads the exports found under one directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read one table from whichever export exists for it.
    pub fn load_table(&self, key: TableKey, files: &[PathBuf]) -> Result<Table> {
        let stem = key.source_stem();
        let pick = |ext: &str| {
            files.iter().find(|p| {
                p.file_stem().map(|s| s == stem.as_str()).unwrap_or(false)
                    && p.extension().map(|e| e == ext).unwrap_or(false)
            })
        };

        if let Some(path) = pick("json") {
            debug!(table = %key, path = %path.display(), "reading JSON export");
            return read_json_records(path);
        }
        if let Some(path) = pick("csv") {
            debug!(table = %key, path = %path.display(), "reading CSV export");
            return read_csv(path, CsvConvention::for_table(key));
        }

        warn!(table = %key, "no export found in {}", self.root.display());
        Ok(Table::empty())
    }
}

impl DataSource for DirectorySource {
    fn load(&self) -> Result<TableSet> {
        if !self.root.is_dir() {
            return Err(AndinaError::DataPathNotFound(self.root.clone()));
        }

        let files = find_data_files(&self.root);
        let mut set = TableSet::new();
        for key in TableKey::RAW {
            let table = match self.load_table(key, &files) {
                Ok(table) => table,
                Err(e) => {
                    warn!(table = %key, "Failed to load table: {}", e);
                    Table::empty()
                }
            };
            set.insert(key, table);
        }

        debug!(
            "Loaded {} tables from {}",
            set.iter().filter(|(_, t)| !t.is_empty()).count(),
            self.root.display()
        );
        Ok(set)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

// ── File helpers ──────────────────────────────────────────────────────────────

/// Find all `.csv` and `.json` files recursively under `root`, sorted by path.
pub fn find_data_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "csv" || ext == "json")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Parse a JSON array of records.
pub fn read_json_records(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).map_err(|source| AndinaError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<serde_json::Value> = serde_json::from_str(&text)?;
    Ok(Table::from_json_records(&records))
}

/// Parse a CSV file with a header row.
pub fn read_csv(path: &Path, convention: CsvConvention) -> Result<Table> {
    let file = std::fs::File::open(path).map_err(|source| AndinaError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv_from(file, convention)
        .map_err(|e| AndinaError::CsvParse(format!("{}: {}", path.display(), e)))
}

fn read_csv_from<R: std::io::Read>(
    input: R,
    convention: CsvConvention,
) -> std::result::Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(convention.delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| convention.parse_cell(cell)).collect());
    }

    Ok(Table::from_rows(&names, rows))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
