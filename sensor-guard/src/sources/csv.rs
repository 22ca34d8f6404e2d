//! Delimited-text sensor logs read through Arrow's CSV decoder.
//!
//! Files are read one record per line. Lines are handed to Arrow in chunks of
//! `batch_size`; when Arrow rejects a chunk (a row with too many fields, an
//! unterminated quote) the chunk is decoded again line by line so only the
//! offending rows are dropped.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use super::{parse_timestamp, IngestOptions};
use crate::error::{GuardError, Result};
use crate::events::{CellValue, SensorEvent};
use crate::sensors::SensorIdentityResolver;

static INTEGER_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[-+]?[0-9]+$").expect("Hard-coded regex pattern should be valid")
});

/// Coerces a raw cell into a number.
///
/// Blank cells, `null` (any case), non-numeric text and non-finite values all
/// yield `None`. Integer-looking text that overflows `i64` is read as a float.
pub fn coerce_cell(raw: &str) -> Option<CellValue> {
    let text = raw.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        return None;
    }

    if INTEGER_REGEX.is_match(text) {
        if let Ok(v) = text.parse::<i64>() {
            return Some(CellValue::Integer(v));
        }
    }

    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(CellValue::Float(v)),
        _ => None,
    }
}

fn is_time_like(column: &str) -> bool {
    let lowered = column.to_lowercase();
    lowered.contains("time") || lowered.contains("date")
}

fn count_letters(line: &[u8]) -> usize {
    line.iter().filter(|b| b.is_ascii_alphabetic()).count()
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Lines to skip before the header: 1 when the second line looks more like a
/// header than the first (strictly more ASCII letters), else 0.
fn detect_header_offset(reader: &mut impl BufRead) -> std::io::Result<usize> {
    let mut first = Vec::new();
    let mut second = Vec::new();
    reader.read_until(b'\n', &mut first)?;
    reader.read_until(b'\n', &mut second)?;

    if count_letters(&second) > count_letters(&first) {
        Ok(1)
    } else {
        Ok(0)
    }
}

/// Reads the next non-blank line, newline-terminated. `Ok(None)` at end of file.
fn next_record_line(reader: &mut impl BufRead) -> std::io::Result<Option<Vec<u8>>> {
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        if is_blank(&line) {
            continue;
        }
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }
        return Ok(Some(line));
    }
}

/// Turns newline-terminated records into all-text record batches.
#[derive(Debug, Clone)]
struct LineDecoder {
    schema: SchemaRef,
    delimiter: u8,
}

impl LineDecoder {
    fn new(columns: &[String], delimiter: u8) -> Self {
        // Everything is read as text; coercion happens per cell.
        let fields: Vec<Field> = columns
            .iter()
            .map(|c| Field::new(c, DataType::Utf8, true))
            .collect();
        Self {
            schema: Arc::new(Schema::new(fields)),
            delimiter,
        }
    }

    /// Decodes `bytes` holding `rows` complete records. Rows with fewer
    /// fields than the header are padded with nulls; any other malformed
    /// record fails the whole call.
    fn decode(
        &self,
        bytes: &[u8],
        rows: usize,
    ) -> std::result::Result<Vec<RecordBatch>, ArrowError> {
        let mut decoder = ReaderBuilder::new(Arc::clone(&self.schema))
            .with_header(false)
            .with_delimiter(self.delimiter)
            .with_batch_size(rows.max(1))
            .with_truncated_rows(true)
            .build_decoder();

        let mut batches = Vec::new();
        let mut remaining = bytes;
        while !remaining.is_empty() {
            let consumed = decoder.decode(remaining)?;
            remaining = &remaining[consumed..];
            if consumed == 0 {
                match decoder.flush()? {
                    Some(batch) => batches.push(batch),
                    None => {
                        return Err(ArrowError::CsvError(
                            "decoder made no progress".to_string(),
                        ))
                    }
                }
            }
        }
        decoder.decode(&[])?;
        if let Some(batch) = decoder.flush()? {
            batches.push(batch);
        }
        Ok(batches)
    }

    /// Decodes `lines` as one chunk, falling back to one line at a time if
    /// the chunk is rejected. Returns the batches and the rejected lines'
    /// errors, in file order.
    fn decode_lines(
        &self,
        lines: &[Vec<u8>],
    ) -> Vec<std::result::Result<RecordBatch, ArrowError>> {
        match self.decode(&lines.concat(), lines.len()) {
            Ok(batches) => batches.into_iter().map(Ok).collect(),
            Err(e) => {
                debug!(
                    error = %e,
                    lines = lines.len(),
                    "Chunk rejected, decoding lines individually"
                );
                let mut results = Vec::with_capacity(lines.len());
                for line in lines {
                    match self.decode(line, 1) {
                        Ok(batches) => results.extend(batches.into_iter().map(Ok)),
                        Err(e) => results.push(Err(e)),
                    }
                }
                results
            }
        }
    }
}

/// Column layout of one file as discovered from its header and preview rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    /// Lines skipped before the header line
    pub header_offset: usize,
    /// Column names in file order
    pub columns: Vec<String>,
    /// Column holding the row timestamp
    pub timestamp_column: String,
}

impl FileLayout {
    /// Picks the first time/date-named column, else the first column whose
    /// preview values hold a parsable timestamp, else the first column.
    fn from_columns(
        header_offset: usize,
        columns: Vec<String>,
        preview: &[RecordBatch],
    ) -> Option<Self> {
        let by_name = columns.iter().position(|c| is_time_like(c));
        let by_content = || {
            (0..columns.len()).find(|idx| {
                preview.iter().any(|batch| {
                    batch.column(*idx).as_string_opt::<i32>().is_some_and(|values| {
                        values.iter().flatten().any(|v| parse_timestamp(v).is_some())
                    })
                })
            })
        };
        let idx = by_name
            .or_else(by_content)
            .or_else(|| (!columns.is_empty()).then_some(0))?;
        Some(Self {
            header_offset,
            timestamp_column: columns[idx].clone(),
            columns,
        })
    }

    /// Columns that carry sensor values: everything except the timestamp
    /// column and ignored columns.
    pub fn value_columns<'a>(&'a self, options: &IngestOptions) -> Vec<&'a str> {
        self.columns
            .iter()
            .filter(|c| **c != self.timestamp_column && !options.is_ignored(c))
            .map(String::as_str)
            .collect()
    }
}

/// One parsed row: its timestamp and the numeric cells that survived coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedRow {
    pub timestamp: DateTime<Utc>,
    pub cells: Vec<(Arc<str>, CellValue)>,
}

/// A single tabular file.
#[derive(Debug, Clone)]
pub struct TabularSource {
    path: PathBuf,
    options: IngestOptions,
}

impl TabularSource {
    pub fn new(path: impl AsRef<Path>, options: IngestOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.path).map_err(|e| {
            GuardError::data_source_with_source(
                self.display_path(),
                "Failed to open file",
                Box::new(e),
            )
        })?;
        Ok(BufReader::new(file))
    }

    /// Opens the file positioned at its header line.
    fn open_at_header(&self, header_offset: usize) -> Result<BufReader<File>> {
        let mut reader = self.open()?;
        let mut skipped = Vec::new();
        for _ in 0..header_offset {
            skipped.clear();
            reader.read_until(b'\n', &mut skipped)?;
        }
        Ok(reader)
    }

    /// Reads the header line and returns its column names, leaving `reader`
    /// at the first data line.
    fn read_header(&self, reader: &mut impl BufRead) -> Result<Vec<String>> {
        let header = next_record_line(reader)?.ok_or_else(|| {
            GuardError::data_source(self.display_path(), "File has no header line")
        })?;

        let (schema, _) = Format::default()
            .with_header(true)
            .with_delimiter(self.options.delimiter)
            .infer_schema(Cursor::new(header), Some(0))
            .map_err(|e| {
                GuardError::data_source_with_source(
                    self.display_path(),
                    "Failed to parse header line",
                    Box::new(e),
                )
            })?;

        Ok(schema
            .fields()
            .iter()
            .map(|f| f.name().trim().to_string())
            .collect())
    }

    /// Detects the header offset, reads the column names from the header line
    /// and inspects the preview rows when no column is named like a timestamp.
    ///
    /// Malformed preview rows are ignored; they never fail the layout.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::DataSource`] if the file cannot be opened or has
    /// no header line.
    pub fn layout(&self) -> Result<FileLayout> {
        let header_offset = detect_header_offset(&mut self.open()?).map_err(|e| {
            GuardError::data_source_with_source(
                self.display_path(),
                "Failed to read leading lines",
                Box::new(e),
            )
        })?;

        let mut reader = self.open_at_header(header_offset)?;
        let columns = self.read_header(&mut reader)?;

        let mut preview_lines = Vec::new();
        while preview_lines.len() < self.options.preview_rows {
            match next_record_line(&mut reader)? {
                Some(line) => preview_lines.push(line),
                None => break,
            }
        }
        let preview: Vec<RecordBatch> = LineDecoder::new(&columns, self.options.delimiter)
            .decode_lines(&preview_lines)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .collect();

        FileLayout::from_columns(header_offset, columns, &preview)
            .ok_or_else(|| GuardError::data_source(self.display_path(), "File has no columns"))
    }

    /// Opens a lazy, non-restartable row reader over the file.
    pub fn rows(&self) -> Result<RowReader> {
        let layout = self.layout()?;
        let mut reader = self.open_at_header(layout.header_offset)?;
        self.read_header(&mut reader)?;

        debug!(
            file = %self.path.display(),
            header_offset = layout.header_offset,
            timestamp_column = %layout.timestamp_column,
            columns = layout.columns.len(),
            "Opened tabular file"
        );

        Ok(RowReader {
            source_file: self.display_path(),
            reader: Some(reader),
            decoder: LineDecoder::new(&layout.columns, self.options.delimiter),
            timestamp_column: layout.timestamp_column,
            options: self.options.clone(),
            pending: VecDeque::new(),
            rows_read: 0,
            rows_skipped: 0,
            batches_skipped: 0,
        })
    }

    /// Reads every event of the file.
    ///
    /// # Errors
    ///
    /// Only file-level failures (open, header) are returned; row and cell
    /// problems are skipped.
    pub fn read_events(&self, resolver: &SensorIdentityResolver) -> Result<Vec<SensorEvent>> {
        let tag = resolver.source_for(&self.path);
        let mut rows = self.rows()?;
        let mut sensor_ids: HashMap<Arc<str>, String> = HashMap::new();
        let mut events = Vec::new();

        for row in rows.by_ref() {
            for (column, value) in row.cells {
                let sensor_id = sensor_ids
                    .entry(Arc::clone(&column))
                    .or_insert_with(|| resolver.resolve_with(&tag, &column));
                events.push(SensorEvent::new(
                    row.timestamp,
                    sensor_id.clone(),
                    value.as_f64(),
                    &tag.source,
                ));
            }
        }

        info!(
            file = %self.path.display(),
            rows = rows.rows_read(),
            rows_skipped = rows.rows_skipped(),
            batches_skipped = rows.batches_skipped(),
            events = events.len(),
            "Ingested file"
        );
        Ok(events)
    }

    /// Like [`read_events`](Self::read_events), but a file-level failure is
    /// logged and yields no events.
    #[instrument(skip(self, resolver), fields(file = %self.path.display()))]
    pub fn events(&self, resolver: &SensorIdentityResolver) -> Vec<SensorEvent> {
        match self.read_events(resolver) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable file");
                Vec::new()
            }
        }
    }
}

/// Iterator over the parsed rows of one file, decoded `batch_size` lines at
/// a time.
///
/// Rows Arrow cannot decode are counted as skipped and reading continues
/// with the next line. An I/O error ends the iteration; rows read before it
/// have already been yielded.
pub struct RowReader {
    source_file: String,
    reader: Option<BufReader<File>>,
    decoder: LineDecoder,
    timestamp_column: String,
    options: IngestOptions,
    pending: VecDeque<TimestampedRow>,
    rows_read: usize,
    rows_skipped: usize,
    batches_skipped: usize,
}

impl RowReader {
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    pub fn batches_skipped(&self) -> usize {
        self.batches_skipped
    }

    /// Up to `batch_size` non-blank lines; empty at end of file.
    fn read_chunk(&mut self) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let Some(reader) = self.reader.as_mut() else {
            return lines;
        };
        while lines.len() < self.options.batch_size {
            match next_record_line(reader) {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => {
                    self.reader = None;
                    break;
                }
                Err(e) => {
                    warn!(
                        file = %self.source_file,
                        error = %e,
                        rows_read = self.rows_read,
                        "Stopping file after read error"
                    );
                    self.reader = None;
                    break;
                }
            }
        }
        lines
    }

    fn timestamp_index(&self, batch: &RecordBatch) -> Option<usize> {
        let schema = batch.schema();
        schema.index_of(&self.timestamp_column).ok().or_else(|| {
            schema
                .fields()
                .iter()
                .position(|f| is_time_like(f.name()))
        })
    }

    fn parse_chunk(&mut self, lines: &[Vec<u8>]) {
        for decoded in self.decoder.decode_lines(lines) {
            match decoded {
                Ok(batch) => self.parse_batch(&batch),
                Err(e) => {
                    self.rows_read += 1;
                    self.rows_skipped += 1;
                    let err = GuardError::malformed_row(&self.source_file, e.to_string());
                    debug!(error = %err, "Skipping undecodable row");
                }
            }
        }
    }

    fn parse_batch(&mut self, batch: &RecordBatch) {
        let Some(ts_idx) = self.timestamp_index(batch) else {
            let err = GuardError::missing_column(&self.timestamp_column, &self.source_file);
            warn!(error = %err, rows = batch.num_rows(), "Skipping batch without timestamp column");
            self.batches_skipped += 1;
            return;
        };

        let schema = batch.schema();
        let value_columns: Vec<(Arc<str>, usize)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(idx, f)| *idx != ts_idx && !self.options.is_ignored(f.name()))
            .map(|(idx, f)| (Arc::from(f.name().trim()), idx))
            .collect();

        for row in 0..batch.num_rows() {
            self.rows_read += 1;
            match self.parse_row(batch, ts_idx, &value_columns, row) {
                Ok(parsed) => self.pending.push_back(parsed),
                Err(e) => {
                    self.rows_skipped += 1;
                    debug!(error = %e, "Skipping row");
                }
            }
        }
    }

    fn parse_row(
        &self,
        batch: &RecordBatch,
        ts_idx: usize,
        value_columns: &[(Arc<str>, usize)],
        row: usize,
    ) -> Result<TimestampedRow> {
        let raw_ts = batch
            .column(ts_idx)
            .as_string_opt::<i32>()
            .filter(|a| !a.is_null(row))
            .map(|a| a.value(row))
            .unwrap_or_default();

        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            GuardError::malformed_row(
                &self.source_file,
                format!("unparsable timestamp '{raw_ts}' at data row {}", self.rows_read),
            )
        })?;

        let cells = value_columns
            .iter()
            .filter_map(|(name, idx)| {
                let array = batch.column(*idx).as_string_opt::<i32>()?;
                if array.is_null(row) {
                    return None;
                }
                coerce_cell(array.value(row)).map(|v| (Arc::clone(name), v))
            })
            .collect();

        Ok(TimestampedRow { timestamp, cells })
    }
}

impl Iterator for RowReader {
    type Item = TimestampedRow;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(row);
            }

            let lines = self.read_chunk();
            if lines.is_empty() {
                return None;
            }
            self.parse_chunk(&lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_coerce_cell() {
        assert_eq!(coerce_cell("42"), Some(CellValue::Integer(42)));
        assert_eq!(coerce_cell(" -7 "), Some(CellValue::Integer(-7)));
        assert_eq!(coerce_cell("+3"), Some(CellValue::Integer(3)));
        assert_eq!(coerce_cell("21.5"), Some(CellValue::Float(21.5)));
        assert_eq!(coerce_cell("1e3"), Some(CellValue::Float(1000.0)));
        assert_eq!(coerce_cell(""), None);
        assert_eq!(coerce_cell("NULL"), None);
        assert_eq!(coerce_cell("null"), None);
        assert_eq!(coerce_cell("abc"), None);
        assert_eq!(coerce_cell("NaN"), None);
        assert_eq!(coerce_cell("inf"), None);
    }

    #[test]
    fn test_coerce_cell_integer_overflow_falls_back_to_float() {
        let v = coerce_cell("99999999999999999999").unwrap();
        assert!(matches!(v, CellValue::Float(_)));
    }

    #[test]
    fn test_detect_header_offset() {
        let mut with_title = "EDEN export\nTimestamp,CO2,Temp\n2020-01-01,1,2\n".as_bytes();
        assert_eq!(detect_header_offset(&mut with_title).unwrap(), 1);

        let mut plain = "Timestamp,CO2,Temp\n2020-01-01 00:00:00,1,2\n".as_bytes();
        assert_eq!(detect_header_offset(&mut plain).unwrap(), 0);

        let mut single = "time,value\n".as_bytes();
        assert_eq!(detect_header_offset(&mut single).unwrap(), 0);
    }

    #[test]
    fn test_layout_picks_time_like_column() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "veg_01.csv",
            "co2,Date Time,temp\n400,2020-01-01 00:00:00,20\n",
        );
        let layout = TabularSource::new(&path, IngestOptions::default())
            .layout()
            .unwrap();
        assert_eq!(layout.header_offset, 0);
        assert_eq!(layout.timestamp_column, "Date Time");
        assert_eq!(
            layout.value_columns(&IngestOptions::default()),
            vec!["co2", "temp"]
        );
    }

    #[test]
    fn test_layout_falls_back_to_first_column() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "x.csv", "stamp,co2\n2020-01-01 00:00:00,400\n");
        let layout = TabularSource::new(&path, IngestOptions::default())
            .layout()
            .unwrap();
        assert_eq!(layout.timestamp_column, "stamp");
    }

    #[test]
    fn test_title_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "veg_01_2020.csv",
            "EDEN export\nTimestamp,CO2,Temp\n2020-01-01 00:00:00,400,21.5\n",
        );
        let source = TabularSource::new(&path, IngestOptions::default());
        assert_eq!(source.layout().unwrap().header_offset, 1);

        let rows: Vec<TimestampedRow> = source.rows().unwrap().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells.len(), 2);
        assert_eq!(&*rows[0].cells[0].0, "CO2");
        assert_eq!(rows[0].cells[0].1, CellValue::Integer(400));
        assert_eq!(rows[0].cells[1].1, CellValue::Float(21.5));
    }

    #[test]
    fn test_bad_rows_and_cells_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "veg_01.csv",
            "time,co2,temp,Mission_Milestone\n\
             2020-01-01 00:00:00,400,,M1\n\
             not a time,401,20,M1\n\
             ,402,20,M1\n\
             2020-01-01 00:02:00,null,abc,M2\n\
             2020-01-01 00:03:00,403,22,M2\n",
        );
        let source = TabularSource::new(&path, IngestOptions::default());
        let mut reader = source.rows().unwrap();
        let rows: Vec<TimestampedRow> = reader.by_ref().collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cells.len(), 1);
        assert!(rows[1].cells.is_empty());
        assert_eq!(rows[2].cells.len(), 2);
        assert!(rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .all(|(name, _)| &**name != "Mission_Milestone"));
        assert_eq!(reader.rows_read(), 5);
        assert_eq!(reader.rows_skipped(), 2);
    }

    #[test]
    fn test_small_batches_read_whole_file() {
        let dir = TempDir::new().unwrap();
        let mut contents = String::from("time,level\n");
        for i in 0..25 {
            contents.push_str(&format!("2020-01-01 00:{i:02}:00,{i}\n"));
        }
        let path = write_file(&dir, "tank_02.csv", &contents);
        let options = IngestOptions::default().with_batch_size(4);
        let rows: Vec<TimestampedRow> = TabularSource::new(&path, options)
            .rows()
            .unwrap()
            .collect();
        assert_eq!(rows.len(), 25);
        assert_eq!(rows[24].cells[0].1, CellValue::Integer(24));
    }

    #[test]
    fn test_malformed_row_skipped_within_batch() {
        let dir = TempDir::new().unwrap();
        let mut contents = String::from("time,level\n");
        for i in 0..6 {
            contents.push_str(&format!("2020-01-01 00:0{i}:00,{i}\n"));
        }
        contents.push_str("2020-01-01 00:06:00,6,extra,fields\n");
        contents.push_str("2020-01-01 00:07:00,7\n");
        let path = write_file(&dir, "tank_02.csv", &contents);
        let options = IngestOptions::default().with_batch_size(2);
        let mut reader = TabularSource::new(&path, options).rows().unwrap();
        let rows: Vec<TimestampedRow> = reader.by_ref().collect();

        assert_eq!(rows.len(), 7);
        assert_eq!(rows[6].cells[0].1, CellValue::Integer(7));
        assert_eq!(reader.rows_read(), 8);
        assert_eq!(reader.rows_skipped(), 1);
    }

    #[test]
    fn test_long_row_does_not_end_file() {
        let dir = TempDir::new().unwrap();
        let mut contents = String::from("time,temp\n");
        for i in 0..60 {
            if i == 20 {
                contents.push_str(&format!("2020-01-01 01:{i:02}:00,21,oops\n"));
            } else {
                contents.push_str(&format!("2020-01-01 01:{i:02}:00,{i}\n"));
            }
        }
        let path = write_file(&dir, "veg_01.csv", &contents);
        let mut reader = TabularSource::new(&path, IngestOptions::default())
            .rows()
            .unwrap();
        let rows: Vec<TimestampedRow> = reader.by_ref().collect();

        assert_eq!(rows.len(), 59);
        assert_eq!(rows[20].cells[0].1, CellValue::Integer(21));
        assert_eq!(rows[58].cells[0].1, CellValue::Integer(59));
        assert_eq!(reader.rows_skipped(), 1);
    }

    #[test]
    fn test_short_row_in_preview_is_padded() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "veg_01.csv",
            "time,temp,rh\n\
             2020-01-01 00:00:00,20\n\
             2020-01-01 00:01:00,21,50\n\
             2020-01-01 00:02:00,22,51\n",
        );
        let source = TabularSource::new(&path, IngestOptions::default());
        assert_eq!(source.layout().unwrap().timestamp_column, "time");

        let rows: Vec<TimestampedRow> = source.rows().unwrap().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cells.len(), 1);
        assert_eq!(source.events(&SensorIdentityResolver::default()).len(), 5);
    }

    #[test]
    fn test_layout_detects_timestamp_by_content() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "x.csv",
            "co2,stamp\n400,2020-01-01 00:00:00\n410,2020-01-01 00:01:00\n",
        );
        let source = TabularSource::new(&path, IngestOptions::default());
        assert_eq!(source.layout().unwrap().timestamp_column, "stamp");

        let rows: Vec<TimestampedRow> = source.rows().unwrap().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&*rows[1].cells[0].0, "co2");
    }

    #[test]
    fn test_events_resolve_sensor_ids() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("edeniss2020").join("AMS-FEG");
        fs::create_dir_all(&nested).unwrap();
        let path = nested.join("co2.csv");
        fs::write(&path, "time,CO2 1\n2020-01-01 00:00:00,400\n2020-01-01 00:01:00,410\n").unwrap();

        let events = TabularSource::new(&path, IngestOptions::default())
            .events(&SensorIdentityResolver::default());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sensor_id, "edeniss2020-ams-feg-co2_1");
        assert_eq!(events[0].source, "edeniss2020");
        assert_eq!(events[0].value, 400.0);
        assert_eq!(events[1].value, 410.0);
        assert!(events.iter().all(|e| e.parameter.is_none()));
    }

    #[test]
    fn test_missing_file_yields_no_events() {
        let source = TabularSource::new("/no/such/file.csv", IngestOptions::default());
        assert!(matches!(
            source.layout(),
            Err(GuardError::DataSource { .. })
        ));
        assert!(source.events(&SensorIdentityResolver::default()).is_empty());
    }

    #[test]
    fn test_empty_file_yields_no_events() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "");
        let source = TabularSource::new(&path, IngestOptions::default());
        assert!(source.events(&SensorIdentityResolver::default()).is_empty());
    }
}
