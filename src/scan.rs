/// Directory walk: feed every line of every log file under a root through the
/// extractor and into the aggregator.
use crate::aggregate::Aggregator;
use crate::config::ScanConfig;
use crate::extract::LineExtractor;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Counters for one scan, logged when the walk completes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub files_scanned: u64,
    pub files_filtered: u64,
    pub lines_read: u64,
    pub lines_accepted: u64,
    pub lines_rejected: u64,
    pub bad_timestamps: u64,
}

impl ScanSummary {
    fn absorb(&mut self, other: ScanSummary) {
        self.files_scanned += other.files_scanned;
        self.files_filtered += other.files_filtered;
        self.lines_read += other.lines_read;
        self.lines_accepted += other.lines_accepted;
        self.lines_rejected += other.lines_rejected;
        self.bad_timestamps += other.bad_timestamps;
    }
}

/// Errors that abort a scan.
#[derive(Debug)]
pub enum ScanError {
    /// Walking the tree failed (includes a missing or unreadable root).
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        path: PathBuf,
        line: u64,
        source: std::io::Error,
    },
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::Walk { root, source } => {
                write!(f, "failed to walk {}: {}", root.display(), source)
            }
            ScanError::Open { path, source } => {
                write!(f, "failed to open {}: {}", path.display(), source)
            }
            ScanError::Read { path, line, source } => {
                write!(
                    f,
                    "failed to read {} at line {}: {}",
                    path.display(),
                    line,
                    source
                )
            }
            ScanError::Pattern { pattern, source } => {
                write!(f, "invalid include pattern {pattern:?}: {source}")
            }
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Walk { source, .. } => Some(source),
            ScanError::Open { source, .. } => Some(source),
            ScanError::Read { source, .. } => Some(source),
            ScanError::Pattern { source, .. } => Some(source),
        }
    }
}

/// Walks a directory tree in file-name order and fills an [`Aggregator`].
pub struct Scanner<'a> {
    extractor: &'a LineExtractor,
    include: Vec<glob::Pattern>,
    follow_links: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &ScanConfig, extractor: &'a LineExtractor) -> Result<Self, ScanError> {
        let include = config
            .include
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| ScanError::Pattern {
                    pattern: p.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            extractor,
            include,
            follow_links: config.follow_links,
        })
    }

    /// Scan every regular file under `root`.
    pub fn scan_dir(&self, root: &Path, agg: &mut Aggregator) -> Result<ScanSummary, ScanError> {
        tracing::info!(root = %root.display(), "scanning log directory");

        let mut summary = ScanSummary::default();
        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| ScanError::Walk {
                root: root.to_path_buf(),
                source: e,
            })?;

            if !is_regular_file(&entry) {
                continue;
            }

            if !self.wants(entry.path()) {
                tracing::debug!(path = %entry.path().display(), "skipping file by name filter");
                summary.files_filtered += 1;
                continue;
            }

            summary.absorb(self.scan_file(entry.path(), agg)?);
        }

        tracing::info!(
            files = summary.files_scanned,
            filtered = summary.files_filtered,
            lines = summary.lines_read,
            accepted = summary.lines_accepted,
            rejected = summary.lines_rejected,
            bad_timestamps = summary.bad_timestamps,
            accounts = agg.len(),
            "scan complete"
        );

        Ok(summary)
    }

    /// Scan a single file. The handle is closed before returning.
    pub fn scan_file(&self, path: &Path, agg: &mut Aggregator) -> Result<ScanSummary, ScanError> {
        let file = std::fs::File::open(path).map_err(|e| ScanError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let reader = std::io::BufReader::new(file);

        let mut summary = self.scan_reader(reader, path, agg)?;
        summary.files_scanned = 1;
        tracing::debug!(
            path = %path.display(),
            lines = summary.lines_read,
            accepted = summary.lines_accepted,
            "scanned file"
        );
        Ok(summary)
    }

    /// Scan lines from any reader. `path` is used only for diagnostics.
    ///
    /// Lines are decoded lossily so stray non-UTF-8 bytes never abort a run.
    pub fn scan_reader<R: BufRead>(
        &self,
        mut reader: R,
        path: &Path,
        agg: &mut Aggregator,
    ) -> Result<ScanSummary, ScanError> {
        let mut summary = ScanSummary::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| ScanError::Read {
                    path: path.to_path_buf(),
                    line: summary.lines_read + 1,
                    source: e,
                })?;
            if n == 0 {
                break;
            }
            summary.lines_read += 1;

            let line = String::from_utf8_lossy(trim_line_ending(&buf));
            match self.extractor.extract(&line) {
                Ok(Some(obs)) => {
                    summary.lines_accepted += 1;
                    agg.observe(obs);
                }
                Ok(None) => summary.lines_rejected += 1,
                Err(e) => {
                    summary.bad_timestamps += 1;
                    tracing::warn!(
                        path = %path.display(),
                        line = summary.lines_read,
                        error = %e,
                        "skipping line"
                    );
                }
            }
        }

        Ok(summary)
    }

    fn wants(&self, path: &Path) -> bool {
        if self.include.is_empty() {
            return true;
        }
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy(),
            None => return false,
        };
        self.include.iter().any(|p| p.matches(&name))
    }
}

/// Regular files, plus symlinks to regular files even when links are not
/// followed. Symlinked directories are never descended unless configured.
fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
