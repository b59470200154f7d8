mod aggregate;
mod config;
mod extract;
mod report;
mod scan;
mod session;

use aggregate::Aggregator;
use clap::Parser;
use config::{ConfigError, ReportFormat, Settings};
use extract::LineExtractor;
use report::Report;
use scan::{ScanError, Scanner};
use session::SessionEngine;
use std::path::PathBuf;
use std::process::ExitCode;

/// Summarize web access logs per account: page hits, sessions, and
/// session lengths for the busiest accounts.
#[derive(Parser, Debug)]
#[command(name = "logstat", version, about)]
pub struct Cli {
    /// Directory containing access logs (searched recursively)
    #[arg(value_name = "LOG_DIR")]
    log_dir: PathBuf,

    /// Settings file (TOML); nothing is read unless this is given
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of accounts to list (overrides config)
    #[arg(short = 'n', long)]
    top: Option<usize>,

    /// Inactivity gap in seconds that starts a new session (overrides config)
    #[arg(long, value_name = "SECS")]
    gap: Option<i64>,

    /// Minimum account id length (overrides config)
    #[arg(long)]
    min_id_len: Option<usize>,

    /// Only read files whose name matches this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    include: Vec<String>,

    /// Follow symbolic links while walking
    #[arg(long)]
    follow_links: bool,

    /// Output format (overrides config)
    #[arg(long, value_enum)]
    format: Option<ReportFormat>,

    /// Validate settings and print them, don't scan
    #[arg(long)]
    dry_run: bool,

    /// Debug logging (per-file progress, new accounts)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Load the optional settings file and layer CLI overrides on top.
    fn settings(&self) -> Result<Settings, ConfigError> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(top) = self.top {
            settings.report.top = top;
        }
        if let Some(gap) = self.gap {
            settings.session.gap_secs = gap;
        }
        if let Some(len) = self.min_id_len {
            settings.extract.min_id_len = len;
        }
        if !self.include.is_empty() {
            settings.scan.include = self.include.clone();
        }
        if self.follow_links {
            settings.scan.follow_links = true;
        }
        if let Some(format) = self.format {
            settings.report.format = format;
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);
    tracing::debug!(?cli, "parsed CLI arguments");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "logstat failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "logstat=debug"
    } else if cli.quiet {
        "logstat=warn"
    } else {
        "logstat=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), RunError> {
    let settings = cli.settings()?;

    if cli.dry_run {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    let extractor = LineExtractor::new(settings.extract.min_id_len);
    let engine = SessionEngine::new(settings.session.gap_secs);
    let scanner = Scanner::new(&settings.scan, &extractor)?;

    let mut agg = Aggregator::new();
    scanner.scan_dir(&cli.log_dir, &mut agg)?;
    if agg.is_empty() {
        tracing::warn!(root = %cli.log_dir.display(), "no page hits found");
    }
    tracing::debug!(
        accounts = agg.len(),
        hits = agg.total_hits(),
        gap_secs = engine.gap_secs(),
        "building report"
    );

    let report = Report::build(&agg, &engine, settings.report.top);
    let stdout = std::io::stdout().lock();
    match settings.report.format {
        ReportFormat::Text => report.write_text(stdout).map_err(RunError::Output)?,
        ReportFormat::Json => report
            .write_json(stdout)
            .map_err(|e| RunError::Output(e.into()))?,
    }

    Ok(())
}

/// Anything that ends a run with a non-zero exit.
#[derive(Debug)]
enum RunError {
    Config(ConfigError),
    Scan(ScanError),
    Output(std::io::Error),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "{e}"),
            RunError::Scan(e) => write!(f, "{e}"),
            RunError::Output(e) => write!(f, "failed to write report: {e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Config(e) => Some(e),
            RunError::Scan(e) => Some(e),
            RunError::Output(e) => Some(e),
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl From<ScanError> for RunError {
    fn from(e: ScanError) -> Self {
        RunError::Scan(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("logstat").chain(args.iter().copied())).unwrap()
    }

    fn write_logs(dir: &TempDir) {
        let mut f = std::fs::File::create(dir.path().join("access.log")).unwrap();
        let lines = [
            ("71f28176", "10:00:00"),
            ("41f58122", "10:00:30"),
            ("71f28176", "10:04:00"),
            ("71f28176", "10:30:00"),
            ("41f58122", "10:01:00"),
            ("58122233", "10:02:00"),
            ("71f28176", "10:35:00"),
        ];
        for (id, time) in lines {
            writeln!(
                f,
                r#"192.0.2.1 - - [05/Jun/2023:{time} +0000] "GET /portal/u/{id}/dashboard HTTP/1.1" 200 1043 "-" "Mozilla/5.0""#
            )
            .unwrap();
        }
    }

    fn report_for(dir: &TempDir, settings: &Settings) -> String {
        let extractor = LineExtractor::new(settings.extract.min_id_len);
        let scanner = Scanner::new(&settings.scan, &extractor).unwrap();
        let mut agg = Aggregator::new();
        scanner.scan_dir(dir.path(), &mut agg).unwrap();
        let engine = SessionEngine::new(settings.session.gap_secs);
        let report = Report::build(&agg, &engine, settings.report.top);
        let mut buf = Vec::new();
        report.write_text(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn missing_log_dir_is_usage_error() {
        let err = Cli::try_parse_from(["logstat"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn cli_overrides_defaults() {
        let cli = parse(&[
            "/var/log/web",
            "-n",
            "3",
            "--gap",
            "900",
            "--include",
            "*.log",
            "--include",
            "*.txt",
            "--format",
            "json",
        ]);
        let s = cli.settings().unwrap();
        assert_eq!(cli.log_dir, PathBuf::from("/var/log/web"));
        assert_eq!(s.report.top, 3);
        assert_eq!(s.session.gap_secs, 900);
        assert_eq!(s.scan.include, vec!["*.log", "*.txt"]);
        assert_eq!(s.report.format, ReportFormat::Json);
        assert_eq!(s.extract.min_id_len, 7);
    }

    #[test]
    fn cli_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logstat.toml");
        std::fs::write(&path, "[report]\ntop = 8\n\n[session]\ngap_secs = 120\n").unwrap();

        let cli = parse(&["logs", "--config", path.to_str().unwrap(), "--top", "2"]);
        let s = cli.settings().unwrap();
        assert_eq!(s.report.top, 2);
        assert_eq!(s.session.gap_secs, 120);
    }

    #[test]
    fn invalid_override_fails_validation() {
        let cli = parse(&["logs", "--gap", "0"]);
        assert!(matches!(cli.settings(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn end_to_end_report() {
        let dir = TempDir::new().unwrap();
        write_logs(&dir);

        let out = report_for(&dir, &Settings::default());
        // 71f28176: 10:00, 10:04 | gap 26m | 10:30, 10:35 -> last session 5 min
        // 41f58122: 10:00:30, 10:01 -> single session, 30s rounds up to 1 min
        assert_eq!(
            out,
            "Total unique users: 3\n\
             Top users:\n\
             id\t\t# pages\t# sess\tlongest\tshortest\n\
             71f28176\t4\t2\t5\t1\n\
             41f58122\t2\t1\t1\t1\n\
             58122233\t1\t1\t1\t1\n"
        );
    }

    #[test]
    fn top_limits_rows() {
        let dir = TempDir::new().unwrap();
        write_logs(&dir);

        let mut settings = Settings::default();
        settings.report.top = 1;
        let out = report_for(&dir, &settings);
        assert!(out.starts_with("Total unique users: 3\n"));
        assert_eq!(out.lines().count(), 4);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let dir = TempDir::new().unwrap();
        write_logs(&dir);
        std::fs::create_dir(dir.path().join("older")).unwrap();
        std::fs::copy(
            dir.path().join("access.log"),
            dir.path().join("older").join("access.log.1"),
        )
        .unwrap();

        let first = report_for(&dir, &Settings::default());
        let second = report_for(&dir, &Settings::default());
        assert_eq!(first, second);
    }

    #[test]
    fn run_fails_on_missing_directory() {
        let cli = parse(&["/nonexistent/logstat-logs", "-q"]);
        assert!(matches!(run(&cli), Err(RunError::Scan(ScanError::Walk { .. }))));
    }
}
