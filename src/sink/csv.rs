//! CsvWindowSink: one CSV file per flushed window.
//!
//! Files are named `[prefix]NNN_YYYYmmddHHMMSS.csv`, where `NNN` continues
//! the highest sequence number already present in the output directory, so
//! restarting a capture never overwrites earlier windows.

use super::{Sink, SinkReport};
use crate::error::{Result, ResultExt};
use crate::types::{iso_millis, FlushedWindow};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Index file listing every written window, for later labelling.
pub const ANNOTATIONS_FILE: &str = "annotations.csv";

const SEQUENCE_DIGITS: usize = 3;
const STAMP_DIGITS: usize = 14;

pub struct CsvWindowSink {
    dir: PathBuf,
    prefix: String,
    annotations: bool,
    windows_written: u64,
}

impl CsvWindowSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: String::new(),
            annotations: true,
            windows_written: 0,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_annotations(mut self, enabled: bool) -> Self {
        self.annotations = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn windows_written(&self) -> u64 {
        self.windows_written
    }

    /// Next free sequence number in the output directory.
    pub fn next_sequence(&self) -> Result<u32> {
        if !self.dir.exists() {
            return Ok(1);
        }
        let mut highest = 0;
        for entry in fs::read_dir(&self.dir).context("Failed to scan output directory")? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(seq) = parse_sequence(&name.to_string_lossy(), &self.prefix) {
                highest = highest.max(seq);
            }
        }
        Ok(highest + 1)
    }

    fn write_window(&self, path: &Path, window: &FlushedWindow) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let mut header = String::from("timestamp");
        for name in window.channels.names() {
            header.push(',');
            header.push_str(&name.to_lowercase());
        }
        writeln!(writer, "{}", header)?;

        for sample in window.samples() {
            let mut row = iso_millis(&window.wall_time(sample));
            for value in sample.values() {
                use std::fmt::Write as FmtWrite;
                let _ = write!(row, ",{}", value);
            }
            writeln!(writer, "{}", row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn annotate(&self, stem: &str) -> Result<PathBuf> {
        let path = self.dir.join(ANNOTATIONS_FILE);
        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        if is_new {
            writeln!(file, "filename,label")?;
        }
        writeln!(file, "{},", stem)?;
        Ok(path)
    }
}

impl Sink for CsvWindowSink {
    fn name(&self) -> &'static str {
        "CsvWindowSink"
    }

    fn deliver(&mut self, window: &FlushedWindow) -> Result<SinkReport> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let stem = format!(
            "{}{:0width$}_{}",
            self.prefix,
            self.next_sequence()?,
            window.flushed_at.format("%Y%m%d%H%M%S"),
            width = SEQUENCE_DIGITS
        );
        let path = self.dir.join(format!("{}.csv", stem));
        self.write_window(&path, window)?;
        tracing::info!("Wrote {} rows to {}", window.len(), path.display());

        let mut report = SinkReport::rows(window.len()).with_artifact(path);
        if self.annotations {
            report = report.with_artifact(self.annotate(&stem)?);
        }
        self.windows_written += 1;
        Ok(report)
    }
}

/// Sequence number of a `[prefix]NNN_YYYYmmddHHMMSS.csv` file name.
fn parse_sequence(file_name: &str, prefix: &str) -> Option<u32> {
    let stem = file_name.strip_prefix(prefix)?.strip_suffix(".csv")?;
    let (seq, stamp) = stem.split_once('_')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if seq.len() < SEQUENCE_DIGITS || !all_digits(seq) {
        return None;
    }
    if stamp.len() != STAMP_DIGITS || !all_digits(stamp) {
        return None;
    }
    seq.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelSet, FlushReason, Sample, Window};
    use std::time::{Duration, Instant};

    fn window(n: usize) -> FlushedWindow {
        let epoch = chrono::Local::now();
        FlushedWindow {
            reason: FlushReason::Timer,
            channels: ChannelSet::xyz(),
            window: Window {
                started: Instant::now(),
                samples: (0..n)
                    .map(|i| {
                        Sample::new(
                            Duration::from_millis(100 * i as u64),
                            vec![i as f64, 0.5, -1.25],
                        )
                    })
                    .collect(),
            },
            epoch,
            flushed_at: epoch,
        }
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("007_20261016120000.csv", ""), Some(7));
        assert_eq!(parse_sequence("1234_20261016120000.csv", ""), Some(1234));
        assert_eq!(parse_sequence("run_002_20261016120000.csv", "run_"), Some(2));
        assert_eq!(parse_sequence("annotations.csv", ""), None);
        assert_eq!(parse_sequence("07_20261016120000.csv", ""), None);
        assert_eq!(parse_sequence("007_2026.csv", ""), None);
        assert_eq!(parse_sequence("007_20261016120000.txt", ""), None);
    }

    #[test]
    fn test_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvWindowSink::new(dir.path());
        let report = sink.deliver(&window(3)).unwrap();

        assert_eq!(report.rows, 3);
        let csv_path = &report.artifacts[0];
        let name = csv_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("001_"));
        assert!(name.ends_with(".csv"));

        let content = fs::read_to_string(csv_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "timestamp,x,y,z");
        assert!(lines[2].ends_with(",1,0.5,-1.25"));
    }

    #[test]
    fn test_sequence_continues_from_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("041_20250101000000.csv"), "").unwrap();
        fs::write(dir.path().join("notes.csv"), "").unwrap();

        let mut sink = CsvWindowSink::new(dir.path());
        assert_eq!(sink.next_sequence().unwrap(), 42);
        let report = sink.deliver(&window(1)).unwrap();
        let name = report.artifacts[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("042_"));
        assert_eq!(sink.next_sequence().unwrap(), 43);
    }

    #[test]
    fn test_annotations_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvWindowSink::new(dir.path());
        sink.deliver(&window(1)).unwrap();
        sink.deliver(&window(1)).unwrap();

        let content = fs::read_to_string(dir.path().join(ANNOTATIONS_FILE)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "filename,label");
        assert!(lines[1].starts_with("001_") && lines[1].ends_with(','));
        assert!(lines[2].starts_with("002_"));
        assert_eq!(sink.windows_written(), 2);
    }

    #[test]
    fn test_annotations_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvWindowSink::new(dir.path())
            .with_prefix("walk_")
            .with_annotations(false);
        let report = sink.deliver(&window(2)).unwrap();

        assert_eq!(report.artifacts.len(), 1);
        assert!(!dir.path().join(ANNOTATIONS_FILE).exists());
        let name = report.artifacts[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("walk_001_"));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut sink = CsvWindowSink::new(&nested);
        sink.deliver(&window(1)).unwrap();
        assert!(nested.is_dir());
    }
}
