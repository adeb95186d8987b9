//! Streams a sheet into size-bounded, compressed JSON-lines chunks.

use super::error::{ChessError, ChessResult};
use super::log;
use super::store::{RowStore, SheetSelector, SheetSource};
use super::types::Cell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_ROWS: usize = 5000;
pub const DEFAULT_READ_BATCH_ROWS: usize = 1000;
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;
pub const MANIFEST_NAME: &str = "manifest.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionMode {
    Plain,
    Zstd,
}

impl CompressionMode {
    pub fn parse(raw: &str) -> ChessResult<Self> {
        let normalized = raw.trim();
        if normalized.eq_ignore_ascii_case("zstd") {
            Ok(Self::Zstd)
        } else if normalized.eq_ignore_ascii_case("none") || normalized.eq_ignore_ascii_case("plain")
        {
            Ok(Self::Plain)
        } else {
            Err(ChessError::InvalidConfig(format!(
                "Invalid compression value '{normalized}'. Supported values: 'zstd', 'none'."
            )))
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "none",
            Self::Zstd => "zstd",
        }
    }

    fn compressor(self, level: i32) -> Box<dyn Compressor> {
        match self {
            Self::Plain => Box::new(PlainCompressor),
            Self::Zstd => Box::new(ZstdCompressor { level }),
        }
    }
}

pub trait Compressor {
    fn compress(&self, bytes: &[u8]) -> ChessResult<Vec<u8>>;

    /// File-name suffix appended after `.jsonl`, empty for none.
    fn extension(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    pub level: i32,
}

impl Compressor for ZstdCompressor {
    fn compress(&self, bytes: &[u8]) -> ChessResult<Vec<u8>> {
        Ok(zstd::stream::encode_all(bytes, self.level)?)
    }

    fn extension(&self) -> &'static str {
        ".zst"
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlainCompressor;

impl Compressor for PlainCompressor {
    fn compress(&self, bytes: &[u8]) -> ChessResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn extension(&self) -> &'static str {
        ""
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: String,
    pub name: String,
}

/// Destination for exported blobs.
pub trait ArtifactSink {
    /// Creates a container for one export run and returns its identifier.
    fn create_container(&mut self, name: &str) -> ChessResult<String>;

    fn create_artifact(
        &mut self,
        container_id: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> ChessResult<Artifact>;
}

/// Writes each container as a directory under `root`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactSink for DirectorySink {
    fn create_container(&mut self, name: &str) -> ChessResult<String> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        Ok(dir.display().to_string())
    }

    fn create_artifact(
        &mut self,
        container_id: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> ChessResult<Artifact> {
        let path = Path::new(container_id).join(name);
        fs::write(&path, bytes)?;
        Ok(Artifact {
            id: path.display().to_string(),
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    pub id: String,
    pub name: String,
    pub artifacts: Vec<(String, Vec<u8>)>,
}

/// Keeps artifacts in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub containers: Vec<MemoryContainer>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifact(&self, container_id: &str, name: &str) -> Option<&[u8]> {
        self.containers
            .iter()
            .find(|c| c.id == container_id)?
            .artifacts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.as_slice())
    }
}

impl ArtifactSink for MemorySink {
    fn create_container(&mut self, name: &str) -> ChessResult<String> {
        let id = format!("mem-{}", self.containers.len() + 1);
        self.containers.push(MemoryContainer {
            id: id.clone(),
            name: name.to_string(),
            artifacts: Vec::new(),
        });
        Ok(id)
    }

    fn create_artifact(
        &mut self,
        container_id: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> ChessResult<Artifact> {
        let container = self
            .containers
            .iter_mut()
            .find(|c| c.id == container_id)
            .ok_or_else(|| ChessError::SourceNotFound(format!("container '{container_id}'")))?;
        let idx = container.artifacts.len() + 1;
        container.artifacts.push((name.to_string(), bytes));
        Ok(Artifact {
            id: format!("{container_id}/{idx}"),
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub sheet: SheetSelector,
    pub header_row: usize,
    pub data_start_row: usize,
    pub chunk_rows: usize,
    pub read_batch_rows: usize,
    pub include_manifest: bool,
    pub compression: CompressionMode,
    pub zstd_level: i32,
    /// Defaults to `<sheet>_export_<UTC timestamp>`.
    pub container_name: Option<String>,
}

impl ExportOptions {
    pub fn new(sheet: impl Into<SheetSelector>) -> Self {
        Self {
            sheet: sheet.into(),
            header_row: 1,
            data_start_row: 2,
            chunk_rows: DEFAULT_CHUNK_ROWS,
            read_batch_rows: DEFAULT_READ_BATCH_ROWS,
            include_manifest: true,
            compression: CompressionMode::Zstd,
            zstd_level: DEFAULT_ZSTD_LEVEL,
            container_name: None,
        }
    }

    pub fn validate(&self) -> ChessResult<()> {
        if self.chunk_rows == 0 {
            return Err(ChessError::InvalidConfig(
                "chunk_rows must be positive".to_string(),
            ));
        }
        if self.read_batch_rows == 0 {
            return Err(ChessError::InvalidConfig(
                "read_batch_rows must be positive".to_string(),
            ));
        }
        if self.header_row == 0 || self.data_start_row == 0 {
            return Err(ChessError::InvalidConfig(
                "header_row and data_start_row are 1-based".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub id: String,
    pub name: String,
    /// Row count for chunks, `None` for the manifest.
    pub rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub container_id: String,
    pub files: Vec<ExportedFile>,
    pub total_rows: usize,
}

struct ChunkWriter<'a, K> {
    sink: &'a mut K,
    compressor: Box<dyn Compressor>,
    container_id: String,
    base_name: String,
    chunk_rows: usize,
    lines: Vec<String>,
    files: Vec<ExportedFile>,
}

impl<K: ArtifactSink> ChunkWriter<'_, K> {
    fn push(&mut self, line: String) -> ChessResult<()> {
        self.lines.push(line);
        if self.lines.len() >= self.chunk_rows {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> ChessResult<()> {
        if self.lines.is_empty() {
            return Ok(());
        }

        let rows = self.lines.len();
        let body = self.lines.join("\n");
        self.lines.clear();

        let bytes = self.compressor.compress(body.as_bytes())?;
        let name = format!(
            "{}_part-{:04}.jsonl{}",
            self.base_name,
            self.files.len() + 1,
            self.compressor.extension()
        );
        let artifact = self
            .sink
            .create_artifact(&self.container_id, &name, bytes)?;
        log::info(format!("export: wrote {} ({rows} rows)", artifact.name));

        self.files.push(ExportedFile {
            id: artifact.id,
            name: artifact.name,
            rows: Some(rows),
        });
        Ok(())
    }
}

/// Exports the selected sheet into `sink`. A failure mid-run leaves already
/// flushed chunks in place.
pub fn export<W, K>(workbook: &W, sink: &mut K, options: &ExportOptions) -> ChessResult<ExportResult>
where
    W: SheetSource,
    K: ArtifactSink,
{
    options.validate()?;

    let (sheet_name, sheet) = workbook
        .sheet(&options.sheet)
        .ok_or_else(|| ChessError::SourceNotFound(format!("sheet {:?}", options.sheet)))?;

    let last_row = sheet.last_row();
    if last_row < options.data_start_row {
        return Err(ChessError::NoData(options.data_start_row));
    }

    let width = sheet.last_column();
    let header_cells = sheet
        .get_range(options.header_row, 1, 1, width)?
        .into_iter()
        .next()
        .unwrap_or_default();
    let keys = header_keys(&header_cells, width);

    let container_name = options.container_name.clone().unwrap_or_else(|| {
        format!(
            "{}_export_{}",
            sanitize_name(sheet_name),
            chrono::Utc::now().format("%Y%m%dT%H%M%SZ")
        )
    });
    let container_id = sink.create_container(&container_name)?;

    let mut writer = ChunkWriter {
        sink,
        compressor: options.compression.compressor(options.zstd_level),
        container_id: container_id.clone(),
        base_name: sanitize_name(sheet_name),
        chunk_rows: options.chunk_rows,
        lines: Vec::with_capacity(options.chunk_rows.min(DEFAULT_CHUNK_ROWS)),
        files: Vec::new(),
    };

    let mut total_rows = 0usize;
    let mut row = options.data_start_row;
    while row <= last_row {
        let count = options.read_batch_rows.min(last_row - row + 1);
        let window = sheet.get_range(row, 1, count, width)?;
        for cells in &window {
            writer.push(row_to_json_line(&keys, cells)?)?;
            total_rows += 1;
        }
        row += count;
    }
    writer.flush()?;

    let mut files = std::mem::take(&mut writer.files);
    let sink = writer.sink;

    if options.include_manifest {
        let manifest = serde_json::json!({
            "sheet": sheet_name,
            "header_row": options.header_row,
            "data_start_row": options.data_start_row,
            "chunk_rows": options.chunk_rows,
            "read_batch_rows": options.read_batch_rows,
            "compression": options.compression.as_str(),
            "format": "jsonl",
            "created_at": chrono::Utc::now().to_rfc3339(),
            "total_rows": total_rows,
            "columns": keys,
            "chunks": files
                .iter()
                .map(|f| serde_json::json!({ "name": f.name, "id": f.id, "rows": f.rows }))
                .collect::<Vec<_>>(),
        });
        let body = serde_json::to_vec_pretty(&manifest)?;
        let artifact = sink.create_artifact(&container_id, MANIFEST_NAME, body)?;
        files.push(ExportedFile {
            id: artifact.id,
            name: artifact.name,
            rows: None,
        });
    }

    log::info(format!(
        "export: {total_rows} rows from '{sheet_name}' into {container_id}"
    ));
    Ok(ExportResult {
        container_id,
        files,
        total_rows,
    })
}

/// One unique key per column; blank headers become `col_<n>`.
fn header_keys(cells: &[Cell], width: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    (1..=width)
        .map(|col| {
            let raw = cells
                .get(col - 1)
                .map(|c| c.as_text().trim().to_string())
                .unwrap_or_default();
            let name = if raw.is_empty() {
                format!("col_{col}")
            } else {
                raw
            };
            let mut key = name.clone();
            let mut attempt = 1;
            while !seen.insert(key.clone()) {
                key = if attempt == 1 {
                    format!("{name}_{col}")
                } else {
                    format!("{name}_{col}_{attempt}")
                };
                attempt += 1;
            }
            key
        })
        .collect()
}

/// Serializes a row as a JSON object with keys in column order.
fn row_to_json_line(keys: &[String], cells: &[Cell]) -> ChessResult<String> {
    let mut line = String::from("{");
    for (idx, key) in keys.iter().enumerate() {
        if idx > 0 {
            line.push(',');
        }
        let value = cells.get(idx).map(Cell::to_json).unwrap_or_default();
        line.push_str(&serde_json::to_string(key)?);
        line.push(':');
        line.push_str(&serde_json::to_string(&value)?);
    }
    line.push('}');
    Ok(line)
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "sheet".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::store::{MemoryRowStore, MemoryWorkbook};

    fn workbook(rows: usize) -> MemoryWorkbook {
        let data: Vec<Vec<String>> = (1..=rows)
            .map(|i| vec![format!("C{i:02}"), format!("1. e4 {i}"), String::new()])
            .collect();
        let data: Vec<Vec<&str>> = data
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect();
        let mut book = MemoryWorkbook::new();
        book.add_sheet("Games", MemoryRowStore::with_headers(&["ECO", "PGN", ""], &data));
        book
    }

    fn options(chunk_rows: usize) -> ExportOptions {
        ExportOptions {
            chunk_rows,
            read_batch_rows: 2,
            container_name: Some("run".to_string()),
            ..ExportOptions::new("Games")
        }
    }

    fn lines(bytes: &[u8]) -> Vec<String> {
        let raw = zstd::stream::decode_all(bytes).unwrap();
        String::from_utf8(raw)
            .unwrap()
            .split('\n')
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_export_rotates_chunks_and_writes_manifest() {
        let book = workbook(5);
        let mut sink = MemorySink::new();
        let result = export(&book, &mut sink, &options(2)).unwrap();

        assert_eq!(result.total_rows, 5);
        assert_eq!(result.files.len(), 4);
        let counts: Vec<Option<usize>> = result.files.iter().map(|f| f.rows).collect();
        assert_eq!(counts, vec![Some(2), Some(2), Some(1), None]);
        assert_eq!(result.files[0].name, "Games_part-0001.jsonl.zst");
        assert_eq!(result.files[3].name, MANIFEST_NAME);

        let manifest: serde_json::Value = serde_json::from_slice(
            sink.artifact(&result.container_id, MANIFEST_NAME).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["total_rows"], 5);
        let chunks = manifest["chunks"].as_array().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2]["rows"], 1);
        assert_eq!(chunks[0]["name"], "Games_part-0001.jsonl.zst");
    }

    #[test]
    fn test_chunk_lines_are_json_objects_in_column_order() {
        let book = workbook(3);
        let mut sink = MemorySink::new();
        let result = export(&book, &mut sink, &options(2)).unwrap();

        let first = lines(sink.artifact(&result.container_id, &result.files[0].name).unwrap());
        assert_eq!(first.len(), 2);
        assert_eq!(first[0], r#"{"ECO":"C01","PGN":"1. e4 1","col_3":""}"#);

        let second = lines(sink.artifact(&result.container_id, &result.files[1].name).unwrap());
        assert_eq!(second, vec![r#"{"ECO":"C03","PGN":"1. e4 3","col_3":""}"#]);
    }

    #[test]
    fn test_export_without_manifest_plain() {
        let book = workbook(2);
        let mut sink = MemorySink::new();
        let opts = ExportOptions {
            include_manifest: false,
            compression: CompressionMode::Plain,
            ..options(10)
        };
        let result = export(&book, &mut sink, &opts).unwrap();

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].name, "Games_part-0001.jsonl");
        let body = sink.artifact(&result.container_id, "Games_part-0001.jsonl").unwrap();
        assert_eq!(std::str::from_utf8(body).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_export_errors() {
        let book = workbook(0);
        let mut sink = MemorySink::new();

        assert!(matches!(
            export(&book, &mut sink, &options(0)),
            Err(ChessError::InvalidConfig(_))
        ));
        assert!(matches!(
            export(&book, &mut sink, &ExportOptions::new("Missing")),
            Err(ChessError::SourceNotFound(_))
        ));
        assert!(matches!(
            export(&book, &mut sink, &options(2)),
            Err(ChessError::NoData(2))
        ));
        assert!(sink.containers.is_empty());
    }

    #[test]
    fn test_export_by_index_to_directory() {
        let book = workbook(3);
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());
        let opts = ExportOptions {
            sheet: SheetSelector::Index(0),
            ..options(2)
        };
        let result = export(&book, &mut sink, &opts).unwrap();

        let container = dir.path().join("run");
        assert_eq!(result.container_id, container.display().to_string());
        assert!(container.join("Games_part-0001.jsonl.zst").exists());
        assert!(container.join("Games_part-0002.jsonl.zst").exists());
        assert!(container.join(MANIFEST_NAME).exists());
    }

    #[test]
    fn test_compression_mode_parse() {
        assert_eq!(CompressionMode::parse(" ZSTD ").unwrap(), CompressionMode::Zstd);
        assert_eq!(CompressionMode::parse("none").unwrap(), CompressionMode::Plain);
        assert!(matches!(
            CompressionMode::parse("gzip"),
            Err(ChessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_header_keys_fill_blanks_and_dedupe() {
        let cells = vec![Cell::text("A"), Cell::Empty, Cell::text("A")];
        assert_eq!(header_keys(&cells, 4), vec!["A", "col_2", "A_3", "col_4"]);
    }

    #[test]
    fn test_header_keys_skip_names_already_taken() {
        let cells = vec![Cell::text("A"), Cell::text("A_3"), Cell::text("A")];
        let keys = header_keys(&cells, 3);
        assert_eq!(keys, vec!["A", "A_3", "A_3_2"]);

        let line = row_to_json_line(&keys, &[Cell::text("x"), Cell::text("y"), Cell::text("z")])
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.as_object().unwrap().len(), 3);
        assert_eq!(parsed["A_3_2"], "z");
    }

    #[test]
    fn test_header_keys_placeholder_collision() {
        let cells = vec![Cell::text("col_2"), Cell::Empty];
        assert_eq!(header_keys(&cells, 2), vec!["col_2", "col_2_2"]);
    }
}
