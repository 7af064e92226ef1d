//! Conversion orchestration.
//!
//! A [`Converter`] takes a byte source and a target format, finds the
//! scanner for the source and the encoder for the target, and writes the
//! result to a new file in the output directory. Each call walks the
//! states of [`ConversionState`]; any failure removes the partial output
//! and is reported as a single error.
//!
//! # Example
//!
//! ```no_run
//! use docvert::convert::{ConvertOptions, Converter};
//! use docvert::{DocumentFormat, FormatTable};
//!
//! fn main() -> docvert::Result<()> {
//!     let converter = Converter::new(FormatTable::new(), ConvertOptions::new().with_output_dir("out"));
//!     let result = converter.convert_file("report.docx", DocumentFormat::Odt)?;
//!     println!("{} ({} bytes)", result.output_path.display(), result.bytes_written);
//!     Ok(())
//! }
//! ```

mod batch;
mod cancel;
mod collaborators;

pub use batch::{BatchEvent, BatchJob};
pub use cancel::CancellationToken;
pub use collaborators::{
    DirectoryLocator, HistoryRecord, HistorySink, LogPublisher, MemoryHistory, OutputLocator,
    OutputPublisher,
};

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tempfile::NamedTempFile;

use crate::detect::{DocumentFormat, FormatTable, SourceHint, SNIFF_LEN};
use crate::error::{Error, Result};
use crate::model::{ContentModel, ExtractionStats, Metadata};
use crate::render::{to_text, EncoderRegistry, RenderOptions};
use crate::scanner::{decode_utf8, ScannerRegistry};

/// Name used for outputs whose source had no file name.
const DEFAULT_STEM: &str = "document";

/// Upper bound on ` (n)` suffixes tried before giving up.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Options for document conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Rendering options passed to every encoder
    pub render: RenderOptions,

    /// Output directory used when no [`OutputLocator`] is injected
    pub output_dir: PathBuf,

    /// Replace an existing output file instead of picking a new name
    pub overwrite: bool,

    /// Cancellation flag observed by scanners and encoders
    pub cancel: CancellationToken,
}

impl ConvertOptions {
    /// Create new conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set rendering options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render = options;
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Overwrite existing outputs.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Use a shared cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            output_dir: PathBuf::from("."),
            overwrite: false,
            cancel: CancellationToken::new(),
        }
    }
}

/// Where a conversion is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionState {
    Idle,
    ExtractingSource,
    BuildingModel,
    Encoding,
    Done,
    Failed,
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversionState::Idle => "idle",
            ConversionState::ExtractingSource => "extracting source",
            ConversionState::BuildingModel => "building model",
            ConversionState::Encoding => "encoding",
            ConversionState::Done => "done",
            ConversionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State history of one call.
#[derive(Debug)]
struct StateTracker {
    states: Vec<ConversionState>,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            states: vec![ConversionState::Idle],
        }
    }

    fn current(&self) -> ConversionState {
        self.states.last().copied().unwrap_or(ConversionState::Idle)
    }

    fn enter(&mut self, next: ConversionState) {
        log::debug!("Conversion state: {} -> {}", self.current(), next);
        self.states.push(next);
    }

    /// States so far, e.g. `idle -> extracting source -> failed`.
    fn history(&self) -> String {
        self.states
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    /// Path of the written file
    pub output_path: PathBuf,

    pub source_format: DocumentFormat,
    pub target_format: DocumentFormat,

    /// MIME type of the output
    pub mime_type: &'static str,

    /// Size of the output file
    pub bytes_written: u64,

    /// Statistics of the intermediate model (empty for pass-through copies)
    pub stats: ExtractionStats,

    /// Source document metadata
    pub metadata: Metadata,

    /// Every state the call went through, `Idle` first and `Done` last
    pub states: Vec<ConversionState>,
}

impl ConvertResult {
    /// File name of the output.
    pub fn file_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Converts documents between formats.
///
/// A converter holds no per-call state and can be shared across threads.
pub struct Converter {
    formats: Arc<FormatTable>,
    options: ConvertOptions,
    scanners: ScannerRegistry,
    encoders: EncoderRegistry,
    locator: Arc<dyn OutputLocator>,
    history: Option<Arc<dyn HistorySink>>,
    publisher: Option<Arc<dyn OutputPublisher>>,
}

impl Converter {
    /// Create a converter with the built-in scanners and encoders.
    pub fn new(formats: impl Into<Arc<FormatTable>>, options: ConvertOptions) -> Self {
        let locator = Arc::new(DirectoryLocator::new(options.output_dir.clone()));
        Self {
            formats: formats.into(),
            options,
            scanners: ScannerRegistry::with_defaults(),
            encoders: EncoderRegistry::with_defaults(),
            locator,
            history: None,
            publisher: None,
        }
    }

    /// Take output directories from `locator`.
    pub fn with_locator(mut self, locator: Arc<dyn OutputLocator>) -> Self {
        self.locator = locator;
        self
    }

    /// Report finished conversions to `history`.
    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    /// Publish finished outputs through `publisher`.
    pub fn with_publisher(mut self, publisher: Arc<dyn OutputPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Replace the scanner registry.
    pub fn with_scanners(mut self, scanners: ScannerRegistry) -> Self {
        self.scanners = scanners;
        self
    }

    /// Replace the encoder registry.
    pub fn with_encoders(mut self, encoders: EncoderRegistry) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn formats(&self) -> &FormatTable {
        &self.formats
    }

    /// Convert a byte source to `target`, writing a new file in the output
    /// directory.
    pub fn convert_reader<R: Read>(
        &self,
        reader: R,
        hint: &SourceHint,
        target: DocumentFormat,
    ) -> Result<ConvertResult> {
        let mut states = StateTracker::new();
        match self.run_conversion(reader, hint, target, &mut states) {
            Ok(result) => Ok(result),
            Err(e) => {
                states.enter(ConversionState::Failed);
                log::warn!(
                    "Conversion to {} failed: {} (states: {})",
                    target,
                    e,
                    states.history()
                );
                Err(e)
            }
        }
    }

    /// Convert an in-memory document.
    pub fn convert_bytes(
        &self,
        data: &[u8],
        hint: &SourceHint,
        target: DocumentFormat,
    ) -> Result<ConvertResult> {
        self.convert_reader(Cursor::new(data), hint, target)
    }

    /// Convert a file. The output is named after the input's stem.
    pub fn convert_file<P: AsRef<Path>>(&self, path: P, target: DocumentFormat) -> Result<ConvertResult> {
        let path = path.as_ref();
        let file = File::open(path)?;
        self.convert_reader(file, &SourceHint::from_path(path), target)
    }

    /// Extract the plain text of a source without writing any file.
    pub fn extract_text<R: Read>(&self, reader: R, hint: &SourceHint) -> Result<String> {
        let (mut source, format) = self.open_source(reader, hint)?;
        if format == DocumentFormat::Txt {
            let mut data = Vec::new();
            source.read_to_end(&mut data)?;
            return Ok(decode_utf8(&data, "text").into_owned());
        }

        let model = self.scanners.require(format)?.scan(&mut source, &self.options.cancel)?;
        Ok(to_text(&model, &self.options.render))
    }

    /// Read a source into a content model.
    pub fn read_model<R: Read>(&self, reader: R, hint: &SourceHint) -> Result<ContentModel> {
        let (mut source, format) = self.open_source(reader, hint)?;
        let mut model = self.scanners.require(format)?.scan(&mut source, &self.options.cancel)?;
        model.metadata.source_format = Some(format);
        Ok(model)
    }

    fn run_conversion<R: Read>(
        &self,
        reader: R,
        hint: &SourceHint,
        target: DocumentFormat,
        states: &mut StateTracker,
    ) -> Result<ConvertResult> {
        let cancel = &self.options.cancel;
        cancel.check()?;

        states.enter(ConversionState::ExtractingSource);
        let encoder = self.encoders.require(target)?;
        let (mut source, format) = self.open_source(reader, hint)?;
        let stem = output_stem(hint);

        let (output_path, bytes_written, stats, metadata) =
            if format == DocumentFormat::Txt && target == DocumentFormat::Txt {
                states.enter(ConversionState::Encoding);
                let (path, written) = self.write_output(&stem, target, |out| {
                    Ok(io::copy(&mut source, out)?)
                })?;
                (path, written, ExtractionStats::new(), Metadata::for_source(format))
            } else {
                let scanner = self.scanners.require(format)?;
                states.enter(ConversionState::BuildingModel);
                let model = scanner.scan(&mut source, cancel)?;
                drop(source);
                let stats = model.stats();
                log::debug!(
                    "Built model from {}: {} paragraphs, {} runs, {} tables",
                    format,
                    stats.paragraph_count,
                    stats.run_count,
                    stats.table_count
                );

                states.enter(ConversionState::Encoding);
                let (path, written) = self.write_output(&stem, target, |out| {
                    encoder.encode_counted(&model, out, &self.options.render, cancel)
                })?;
                let mut metadata = model.metadata;
                metadata.source_format = Some(format);
                (path, written, stats, metadata)
            };

        states.enter(ConversionState::Done);
        let result = ConvertResult {
            output_path,
            source_format: format,
            target_format: target,
            mime_type: target.mime_type(),
            bytes_written,
            stats,
            metadata,
            states: states.states.clone(),
        };
        self.notify(&result);
        Ok(result)
    }

    /// Spool the source to an anonymous temporary file and resolve its
    /// format. The file is removed when the returned handle is dropped.
    fn open_source<R: Read>(&self, mut reader: R, hint: &SourceHint) -> Result<(File, DocumentFormat)> {
        let mut spool = tempfile::tempfile()?;
        let size = io::copy(&mut reader, &mut spool)?;
        spool.seek(SeekFrom::Start(0))?;

        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut spool).take(SNIFF_LEN as u64).read_to_end(&mut head)?;
        spool.seek(SeekFrom::Start(0))?;

        let format = self.formats.resolve(hint, &head)?;
        log::debug!("Spooled {} bytes of {} source", size, format);
        Ok((spool, format))
    }

    /// Run `encode` against a temporary file in the output directory and
    /// move it into place only once it succeeds. On error the temporary
    /// file is dropped, which deletes it.
    fn write_output<F>(&self, stem: &str, target: DocumentFormat, encode: F) -> Result<(PathBuf, u64)>
    where
        F: FnOnce(&mut dyn Write) -> Result<u64>,
    {
        let dir = self.locator.output_dir()?;
        let mut temp = tempfile::Builder::new()
            .prefix(".docvert-")
            .suffix(".part")
            .tempfile_in(&dir)?;

        let written = {
            let mut out = BufWriter::new(temp.as_file_mut());
            let written = encode(&mut out)?;
            out.flush()?;
            written
        };
        temp.as_file().sync_all()?;

        let path = self.persist(temp, &dir, stem, target.extension())?;
        Ok((path, written))
    }

    fn persist(&self, mut temp: NamedTempFile, dir: &Path, stem: &str, ext: &str) -> Result<PathBuf> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.{}", stem, ext)
            } else {
                format!("{} ({}).{}", stem, attempt, ext)
            };
            let path = dir.join(name);

            let persisted = if self.options.overwrite {
                temp.persist(&path)
            } else {
                temp.persist_noclobber(&path)
            };
            match persisted {
                Ok(_) => return Ok(path),
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => temp = e.file,
                Err(e) => return Err(e.error.into()),
            }
        }
        Err(Error::Other(format!(
            "no free output name for '{}.{}' in {}",
            stem,
            ext,
            dir.display()
        )))
    }

    /// Fire-and-forget calls to the history and publish collaborators.
    fn notify(&self, result: &ConvertResult) {
        if let Some(history) = &self.history {
            let record = HistoryRecord {
                output_path: result.output_path.clone(),
                file_name: result.file_name(),
                source_format: result.source_format,
                target_format: result.target_format,
                timestamp: Utc::now(),
            };
            if let Err(e) = history.record(&record) {
                log::warn!("Failed to record conversion history: {}", e);
            }
        }

        if let Some(publisher) = &self.publisher {
            let relative = match self.locator.output_dir() {
                Ok(dir) => result
                    .output_path
                    .strip_prefix(&dir)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| result.output_path.clone()),
                Err(_) => result.output_path.clone(),
            };
            if let Err(e) = publisher.publish(&result.output_path, &relative, result.mime_type) {
                log::warn!("Failed to publish {}: {}", result.output_path.display(), e);
            }
        }
    }
}

#[cfg(feature = "async")]
impl Converter {
    /// Convert a file on tokio's blocking pool.
    pub async fn convert_async(
        self: Arc<Self>,
        path: PathBuf,
        target: DocumentFormat,
    ) -> Result<ConvertResult> {
        tokio::task::spawn_blocking(move || self.convert_file(&path, target))
            .await
            .map_err(|e| Error::Other(format!("conversion task failed: {}", e)))?
    }
}

/// Output file stem: the source's stem with characters that are unsafe in
/// file names replaced.
fn output_stem(hint: &SourceHint) -> String {
    let stem: String = hint
        .file_stem()
        .unwrap_or_default()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        DEFAULT_STEM.to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter(dir: &Path) -> Converter {
        Converter::new(FormatTable::new(), ConvertOptions::new().with_output_dir(dir))
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_convert_options_builder() {
        let cancel = CancellationToken::new();
        let options = ConvertOptions::new()
            .with_output_dir("/tmp/out")
            .with_overwrite(true)
            .with_cancellation(cancel.clone());

        assert_eq!(options.output_dir, PathBuf::from("/tmp/out"));
        assert!(options.overwrite);
        cancel.cancel();
        assert!(options.cancel.is_cancelled());
    }

    #[test]
    fn test_text_to_rtf_states() {
        let temp = tempfile::tempdir().unwrap();
        let hint = SourceHint::new().with_file_name("notes.txt");
        let result = converter(temp.path())
            .convert_bytes(b"one\n\ntwo", &hint, DocumentFormat::Rtf)
            .unwrap();

        assert_eq!(result.output_path, temp.path().join("notes.rtf"));
        assert_eq!(result.mime_type, "application/rtf");
        assert_eq!(
            result.states,
            [
                ConversionState::Idle,
                ConversionState::ExtractingSource,
                ConversionState::BuildingModel,
                ConversionState::Encoding,
                ConversionState::Done,
            ]
        );
        assert_eq!(result.stats.paragraph_count, 3);
        let written = std::fs::read(&result.output_path).unwrap();
        assert_eq!(written.len() as u64, result.bytes_written);
    }

    #[test]
    fn test_state_history_ends_in_failed() {
        let mut states = StateTracker::new();
        states.enter(ConversionState::ExtractingSource);
        states.enter(ConversionState::Failed);
        assert_eq!(states.current(), ConversionState::Failed);
        assert_eq!(states.history(), "idle -> extracting source -> failed");
    }

    #[test]
    fn test_text_passthrough() {
        let temp = tempfile::tempdir().unwrap();
        let source = "unchanged\r\n  text without trailing newline";
        let result = converter(temp.path())
            .convert_bytes(source.as_bytes(), &SourceHint::new().with_file_name("a.txt"), DocumentFormat::Txt)
            .unwrap();

        assert_eq!(std::fs::read_to_string(&result.output_path).unwrap(), source);
        assert!(!result.states.contains(&ConversionState::BuildingModel));
    }

    #[test]
    fn test_collision_appends_counter() {
        let temp = tempfile::tempdir().unwrap();
        let converter = converter(temp.path());
        let hint = SourceHint::new().with_file_name("same.txt");

        let first = converter.convert_bytes(b"1", &hint, DocumentFormat::Odt).unwrap();
        let second = converter.convert_bytes(b"2", &hint, DocumentFormat::Odt).unwrap();
        assert_eq!(first.file_name(), "same.odt");
        assert_eq!(second.file_name(), "same (1).odt");
        assert_eq!(dir_entries(temp.path()), ["same (1).odt", "same.odt"]);
    }

    #[test]
    fn test_failure_leaves_no_output() {
        let temp = tempfile::tempdir().unwrap();
        let hint = SourceHint::new().with_format(DocumentFormat::Docx).with_file_name("bad.docx");
        let err = converter(temp.path())
            .convert_bytes(b"this is not a zip archive", &hint, DocumentFormat::Txt)
            .unwrap_err();

        assert!(matches!(err, Error::ArchiveCorrupt(_)));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[test]
    fn test_cancelled_before_start() {
        let temp = tempfile::tempdir().unwrap();
        let options = ConvertOptions::new().with_output_dir(temp.path());
        options.cancel.cancel();
        let converter = Converter::new(FormatTable::new(), options);

        let err = converter
            .convert_bytes(b"text", &SourceHint::new().with_file_name("a.txt"), DocumentFormat::Pdf)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[test]
    fn test_history_and_publisher_called() {
        struct Recorder(std::sync::Mutex<Vec<(PathBuf, String)>>);
        impl OutputPublisher for Recorder {
            fn publish(&self, _path: &Path, relative: &Path, mime: &str) -> Result<()> {
                self.0.lock().unwrap().push((relative.to_path_buf(), mime.to_string()));
                Ok(())
            }
        }

        let temp = tempfile::tempdir().unwrap();
        let history = Arc::new(MemoryHistory::new());
        let publisher = Arc::new(Recorder(Default::default()));
        let converter = converter(temp.path())
            .with_history(history.clone())
            .with_publisher(publisher.clone());

        converter
            .convert_bytes(b"hello", &SourceHint::new().with_file_name("h.txt"), DocumentFormat::Docx)
            .unwrap();

        let records = history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "h.docx");
        assert_eq!(records[0].source_format, DocumentFormat::Txt);
        assert_eq!(
            *publisher.0.lock().unwrap(),
            [(PathBuf::from("h.docx"), DocumentFormat::Docx.mime_type().to_string())]
        );
    }

    #[test]
    fn test_extract_text() {
        let temp = tempfile::tempdir().unwrap();
        let converter = converter(temp.path());
        let rtf = br"{\rtf1\ansi Hello {\b world}\par}";
        let text = converter
            .extract_text(&rtf[..], &SourceHint::new())
            .unwrap();
        assert_eq!(text, "Hello world\n");
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem(&SourceHint::new()), "document");
        assert_eq!(output_stem(&SourceHint::new().with_file_name("a:b.docx")), "a_b");
        assert_eq!(output_stem(&SourceHint::new().with_file_name("report.final.pdf")), "report.final");
    }
}
