use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_NAME: &str = "divfolio.log";

const TRIM_THRESHOLD: u64 = 5 * 1024 * 1024;
const TRIM_KEEP: u64 = 1024 * 1024;
const TRIM_MARKER: &[u8] = b"--- log trimmed (older entries removed) ---\n";

/// Cuts the log down to its most recent whole lines once it passes
/// `TRIM_THRESHOLD`. Returns how many bytes were dropped.
fn trim_log(log_path: &Path) -> std::io::Result<u64> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };
    if size <= TRIM_THRESHOLD {
        return Ok(0);
    }

    let mut tail = Vec::with_capacity(TRIM_KEEP as usize);
    let mut file = File::open(log_path)?;
    file.seek(SeekFrom::Start(size - TRIM_KEEP))?;
    file.read_to_end(&mut tail)?;

    let first_line = tail
        .iter()
        .position(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    let kept = &tail[first_line..];

    let mut file = File::create(log_path)?;
    file.write_all(TRIM_MARKER)?;
    file.write_all(kept)?;
    Ok(size - kept.len() as u64)
}

/// Append handle shared by every event the fmt layer writes.
#[derive(Clone)]
struct SharedLog(Arc<Mutex<File>>);

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

impl<'a> MakeWriter<'a> for SharedLog {
    type Writer = SharedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Sends `tracing` output to [`LOG_FILE_NAME`] under `data_dir`. `RUST_LOG`
/// overrides `level`; stdout stays clean for command output.
pub fn init_logging(data_dir: &Path, level: &str) -> Result<()> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

    let log_path = data_dir.join(LOG_FILE_NAME);
    let dropped = trim_log(&log_path).unwrap_or_else(|err| {
        eprintln!("Warning: failed to trim {}: {err}", log_path.display());
        0
    });

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("divfolio={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(SharedLog(Arc::new(Mutex::new(file))))
                .with_ansi(false),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if dropped > 0 {
        tracing::info!(dropped, "log trimmed");
    }
    Ok(())
}
