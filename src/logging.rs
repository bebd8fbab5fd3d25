use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, anyhow};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LogFormat, LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "gateway.log";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
    run_id: String,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Console output always; a rolling JSON file when `logging.dir` is set.
pub fn init_tracing(logging_config: &LoggingConfig) -> Result<LoggingGuard> {
    if logging_config.filter.trim().is_empty() {
        return Err(anyhow!("logging.filter cannot be empty"));
    }

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_filter = parse_filter(&logging_config.filter)?;
    let console_layer: BoxedLayer = match logging_config.format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(console_filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true)
            .with_ansi(false)
            .with_filter(console_filter)
            .boxed(),
    };
    layers.push(console_layer);

    let mut worker_guard = None;
    let mut retention_warnings = Vec::new();
    let mut resolved_dir = None;
    if let Some(dir) = &logging_config.dir {
        let log_dir = LogDirectory::prepare(dir)?;
        retention_warnings = log_dir.sweep(logging_config.retention_days, SystemTime::now());
        let (non_blocking_writer, guard) =
            tracing_appender::non_blocking(log_dir.appender(logging_config.rotation)?);

        layers.push(
            fmt::layer()
                .json()
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true)
                .with_ansi(false)
                .with_writer(non_blocking_writer)
                .with_filter(parse_filter(&logging_config.filter)?)
                .boxed(),
        );
        worker_guard = Some(guard);
        resolved_dir = Some(log_dir.path);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(ErrorLayer::default())
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        filter = %logging_config.filter,
        format = ?logging_config.format,
        dir = ?resolved_dir,
        rotation = ?logging_config.rotation,
        retention_days = logging_config.retention_days,
        "logging_initialized"
    );
    for warning in retention_warnings {
        tracing::warn!(target: "logging", warning = %warning, "logging_retention_warning");
    }

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
    })
}

fn parse_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter)
        .with_context(|| format!("failed to parse logging.filter '{}'", filter))
}

/// The directory the gateway writes its rolling JSON logs into.
struct LogDirectory {
    path: PathBuf,
}

impl LogDirectory {
    /// Relative directories resolve against the working directory.
    fn prepare(dir: &Path) -> Result<Self> {
        let path = std::path::absolute(dir)
            .with_context(|| format!("failed to resolve logging.dir {}", dir.display()))?;
        fs::create_dir_all(&path)
            .with_context(|| format!("failed to create logging directory {}", path.display()))?;
        Ok(Self { path })
    }

    fn appender(&self, rotation: LoggingRotation) -> Result<RollingFileAppender> {
        let rotation = match rotation {
            LoggingRotation::Daily => Rotation::DAILY,
            LoggingRotation::Hourly => Rotation::HOURLY,
        };
        RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(&self.path)
            .with_context(|| format!("failed to open log file in {}", self.path.display()))
    }

    /// Gateway log files last modified at or before `cutoff`. Other files in
    /// the directory are never listed.
    fn expired_logs(&self, cutoff: SystemTime) -> io::Result<(Vec<PathBuf>, Vec<String>)> {
        let mut expired = Vec::new();
        let mut unreadable = Vec::new();
        for entry in fs::read_dir(&self.path)?.flatten() {
            if !entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX) {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) if !metadata.is_file() => {}
                Ok(metadata) => match metadata.modified() {
                    Ok(modified) if modified <= cutoff => expired.push(entry.path()),
                    Ok(_) => {}
                    Err(err) => unreadable.push(format!(
                        "failed to read mtime for {}: {}",
                        entry.path().display(),
                        err
                    )),
                },
                Err(err) => unreadable.push(format!(
                    "failed to read metadata for {}: {}",
                    entry.path().display(),
                    err
                )),
            }
        }
        Ok((expired, unreadable))
    }

    /// Deletes logs older than the retention window and reports what it
    /// could not clean up. Failures never stop startup.
    fn sweep(&self, retention_days: usize, now: SystemTime) -> Vec<String> {
        let window = Duration::from_secs((retention_days as u64).saturating_mul(SECONDS_PER_DAY));
        let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);

        let (expired, mut warnings) = match self.expired_logs(cutoff) {
            Ok(found) => found,
            Err(err) => {
                return vec![format!(
                    "failed to scan logging directory {}: {}",
                    self.path.display(),
                    err
                )];
            }
        };
        warnings.extend(expired.iter().filter_map(|path| {
            fs::remove_file(path).err().map(|err| {
                format!("failed to remove expired log file {}: {}", path.display(), err)
            })
        }));
        warnings
    }
}
