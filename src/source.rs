//! Table Sources - load a raw table given a source descriptor
//!
//! The pipeline only ever sees a `DataFrame` of string columns. Where it came from
//! (a local export, a shared reference sheet over HTTP) is hidden behind `TableSource`,
//! so transports can be swapped without touching normalization or metrics.

use crate::error::{ReportError, Result};
use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx};
use chrono::Timelike;
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Anything that can produce a raw table
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Human-readable descriptor used in logs and errors
    fn describe(&self) -> String;

    /// Load the table; every column is a nullable string column
    async fn load(&self) -> Result<DataFrame>;
}

/// File layout of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    /// Pick the layout from the descriptor's extension; anything unrecognized is CSV.
    pub fn from_descriptor(descriptor: &str) -> Self {
        let path = descriptor.split(['?', '#']).next().unwrap_or(descriptor);
        let path = path.trim().to_lowercase();
        if path.ends_with(".xlsx") || path.ends_with(".xlsm") {
            TableFormat::Xlsx
        } else {
            TableFormat::Csv
        }
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<DataFrame> {
        match self {
            TableFormat::Csv => parse_csv(&decode_bytes(bytes)?),
            TableFormat::Xlsx => parse_xlsx(bytes),
        }
    }
}

/// CSV or XLSX file on local disk
pub struct LocalFileSource {
    path: PathBuf,
    format: TableFormat,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = TableFormat::from_descriptor(&path.to_string_lossy());
        Self { path, format }
    }
}

#[async_trait]
impl TableSource for LocalFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<DataFrame> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            ReportError::SourceLoad(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        debug!(
            "Read {} bytes from {} ({:?})",
            bytes.len(),
            self.path.display(),
            self.format
        );
        self.format
            .parse(&bytes)
            .map_err(|e| ReportError::SourceLoad(format!("{}: {}", self.describe(), e)))
    }
}

/// CSV or XLSX fetched over HTTP(S)
pub struct HttpSource {
    url: String,
    format: TableFormat,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            format: TableFormat::from_descriptor(&url),
            url,
            client,
        })
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl TableSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn load(&self) -> Result<DataFrame> {
        let bytes = self
            .fetch()
            .await
            .map_err(|e| ReportError::SourceLoad(format!("Failed to fetch {}: {}", self.url, e)))?;
        info!("Fetched {} bytes from {}", bytes.len(), self.url);
        self.format
            .parse(&bytes)
            .map_err(|e| ReportError::SourceLoad(format!("{}: {}", self.url, e)))
    }
}

/// Tries each source in order; the first one that loads wins
pub struct FallbackSource {
    sources: Vec<Box<dyn TableSource>>,
}

impl FallbackSource {
    pub fn new(sources: Vec<Box<dyn TableSource>>) -> Self {
        Self { sources }
    }

    pub fn from_descriptors<S: AsRef<str>>(descriptors: &[S]) -> Result<Self> {
        let sources = descriptors
            .iter()
            .map(|d| source_for(d.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(sources))
    }
}

#[async_trait]
impl TableSource for FallbackSource {
    fn describe(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    async fn load(&self) -> Result<DataFrame> {
        let mut failures = Vec::new();
        for source in &self.sources {
            match source.load().await {
                Ok(df) => {
                    info!("Loaded {} rows from {}", df.height(), source.describe());
                    return Ok(df);
                }
                Err(e) => {
                    warn!("Source {} unavailable, trying next: {}", source.describe(), e);
                    failures.push(e.to_string());
                }
            }
        }
        if failures.is_empty() {
            return Err(ReportError::SourceLoad("no source configured".to_string()));
        }
        Err(ReportError::SourceLoad(format!(
            "all sources failed: {}",
            failures.join("; ")
        )))
    }
}

/// Pick a transport for a descriptor: URLs go over HTTP, everything else is a file path.
pub fn source_for(descriptor: &str) -> Result<Box<dyn TableSource>> {
    let descriptor = descriptor.trim();
    if descriptor.starts_with("http://") || descriptor.starts_with("https://") {
        Ok(Box::new(HttpSource::new(descriptor)?))
    } else {
        Ok(Box::new(LocalFileSource::new(descriptor)))
    }
}

/// Decode CSV bytes: UTF-8 (with or without byte-order marker), falling back to CP949.
pub fn decode_bytes(bytes: &[u8]) -> Result<String> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            let (text, _, had_errors) = encoding_rs::EUC_KR.decode(body);
            if had_errors {
                return Err(ReportError::SourceLoad(
                    "content is neither UTF-8 nor CP949".to_string(),
                ));
            }
            debug!("Decoded content as CP949");
            Ok(text.into_owned())
        }
    }
}

/// Parse CSV text into a frame of nullable string columns.
///
/// Cells are trimmed and empty cells become nulls. Header names are trimmed; blank or
/// repeated headers get pandas-style names (`Unnamed: 3`, `유닛.1`) so the frame stays valid.
pub fn parse_csv(text: &str) -> Result<DataFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = unique_headers(reader.headers()?.iter());
    let rows = reader
        .records()
        .map(|row| row.map(|r| r.iter().map(clean_cell).collect::<Vec<_>>()))
        .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
    build_frame(headers, rows)
}

/// Parse the first worksheet of an XLSX workbook; its first row is the header.
///
/// Produces the same all-string frame as `parse_csv`. Whole numbers render without a
/// fraction (`10`, not `10.0`) and date cells as `YYYY-MM-DD[ HH:MM:SS]`.
pub fn parse_xlsx(bytes: &[u8]) -> Result<DataFrame> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| ReportError::SourceLoad(format!("not a readable workbook: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReportError::SourceLoad("workbook has no worksheet".to_string()))?
        .map_err(|e| ReportError::SourceLoad(format!("unreadable worksheet: {}", e)))?;

    let mut rows = range.rows();
    let header_cells: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| cell_text(c).unwrap_or_default()).collect())
        .unwrap_or_default();
    let headers = unique_headers(header_cells.iter().map(String::as_str));
    let body: Vec<Vec<Option<String>>> = rows
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    debug!("Read {} worksheet rows", body.len());
    build_frame(headers, body)
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.time().num_seconds_from_midnight() == 0 => {
                ts.format("%Y-%m-%d").to_string()
            }
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
    };
    (!text.is_empty()).then_some(text)
}

fn clean_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Columns of nullable strings; short rows are padded with nulls, extra cells dropped.
fn build_frame(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<DataFrame> {
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); headers.len()];
    for mut row in rows {
        row.resize(headers.len(), None);
        for (column, cell) in columns.iter_mut().zip(row) {
            column.push(cell);
        }
    }

    let series: Vec<Series> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name, values))
        .collect();

    Ok(DataFrame::new(series)?)
}

fn unique_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();
    for (idx, name) in raw.enumerate() {
        let name = name.trim();
        let base = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name.to_string()
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        headers.push(candidate);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_trims_and_nulls() {
        let df = parse_csv(" 날짜 ,유닛\n2025-01-01, 3 \n2025-01-02,\n").unwrap();
        assert_eq!(df.get_column_names(), vec!["날짜", "유닛"]);
        let units = df.column("유닛").unwrap().str().unwrap();
        assert_eq!(units.get(0), Some("3"));
        assert_eq!(units.get(1), None);
    }

    #[test]
    fn test_parse_csv_short_rows() {
        let df = parse_csv("a,b,c\n1,2\n").unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("c").unwrap().str().unwrap().get(0), None);
    }

    #[test]
    fn test_duplicate_headers() {
        let df = parse_csv("유닛,유닛,\n1,2,3\n").unwrap();
        assert_eq!(df.get_column_names(), vec!["유닛", "유닛.1", "Unnamed: 2"]);
    }

    #[test]
    fn test_decode_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("날짜".as_bytes());
        assert_eq!(decode_bytes(&bytes).unwrap(), "날짜");
    }

    #[test]
    fn test_decode_cp949() {
        let (encoded, _, _) = encoding_rs::EUC_KR.encode("귀책,유닛");
        assert!(std::str::from_utf8(&encoded).is_err());
        assert_eq!(decode_bytes(&encoded).unwrap(), "귀책,유닛");
    }

    #[test]
    fn test_source_for_picks_transport() {
        assert_eq!(
            source_for("https://example.com/t.csv").unwrap().describe(),
            "https://example.com/t.csv"
        );
        assert_eq!(source_for(" data/log.csv ").unwrap().describe(), "data/log.csv");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TableFormat::from_descriptor("data/log.csv"), TableFormat::Csv);
        assert_eq!(TableFormat::from_descriptor("data/Log.XLSX"), TableFormat::Xlsx);
        assert_eq!(
            TableFormat::from_descriptor("https://example.com/export.xlsx?sheet=1"),
            TableFormat::Xlsx
        );
        assert_eq!(TableFormat::from_descriptor("data/log"), TableFormat::Csv);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Float(10.0)), Some("10".to_string()));
        assert_eq!(cell_text(&Data::Float(2.5)), Some("2.5".to_string()));
        assert_eq!(cell_text(&Data::Int(7)), Some("7".to_string()));
        assert_eq!(cell_text(&Data::String("  OF  ".to_string())), Some("OF".to_string()));
        assert_eq!(cell_text(&Data::String("   ".to_string())), None);
        assert_eq!(cell_text(&Data::Empty), None);
    }

    #[test]
    fn test_parse_xlsx_rejects_garbage() {
        assert!(matches!(
            parse_xlsx(b"not a workbook"),
            Err(ReportError::SourceLoad(_))
        ));
    }
}
