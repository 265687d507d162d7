//! Measurement sources: where the log comes from and where new rows go.
//!
//! - [`HttpSource`] talks to the remote spreadsheet endpoint
//!   (`GET` returns every row, `POST` appends one)
//! - [`JsonlSource`] keeps the same rows in a local JSON Lines file with
//!   file locking, for offline use

use crate::config::SourceConfig;
use crate::{Error, MeasurementLog, RawRecord, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on one request to the remote endpoint
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A store of raw measurement rows
#[allow(async_fn_in_trait)]
pub trait MeasurementSource {
    /// Fetch every row currently in the store
    async fn fetch_records(&self) -> Result<Vec<RawRecord>>;

    /// Append one row to the store
    async fn append_record(&self, record: &RawRecord) -> Result<()>;

    /// Fetch and ingest into a sorted log
    async fn fetch_log(&self) -> Result<MeasurementLog> {
        let records = self.fetch_records().await?;
        Ok(MeasurementLog::from_records(&records))
    }
}

// ============================================================================
// Remote store
// ============================================================================

/// Spreadsheet-backed web endpoint
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSource {
    /// Client for `endpoint` with [`REQUEST_TIMEOUT`] applied to every request
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl MeasurementSource for HttpSource {
    async fn fetch_records(&self) -> Result<Vec<RawRecord>> {
        let records = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<RawRecord>>()
            .await?;
        tracing::debug!("Fetched {} rows from {}", records.len(), self.endpoint);
        Ok(records)
    }

    async fn append_record(&self, record: &RawRecord) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await?
            .error_for_status()?;
        tracing::info!("Posted entry to {}", self.endpoint);
        Ok(())
    }
}

// ============================================================================
// Local store
// ============================================================================

/// JSONL-based row store with file locking
#[derive(Clone, Debug)]
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    /// Create a new JSONL source for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MeasurementSource for JsonlSource {
    async fn fetch_records(&self) -> Result<Vec<RawRecord>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_rows(&path))
            .await
            .map_err(|e| Error::Other(format!("Read task failed: {}", e)))?
    }

    async fn append_record(&self, record: &RawRecord) -> Result<()> {
        let path = self.path.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || append_row(&path, &record))
            .await
            .map_err(|e| Error::Other(format!("Write task failed: {}", e)))?
    }
}

/// Append a row as one JSON line under an exclusive lock
pub fn append_row(path: &Path, record: &RawRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    file.lock_exclusive()?;

    // A hand-edited file may lack the final newline
    let needs_newline = if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        last[0] != b'\n'
    } else {
        false
    };

    let mut writer = std::io::BufWriter::new(&file);
    if needs_newline {
        writer.write_all(b"\n")?;
    }
    let line = serde_json::to_string(record)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    drop(writer);

    file.unlock()?;
    tracing::debug!("Appended row to {:?}", path);
    Ok(())
}

/// Read every row from a JSONL file under a shared lock.
///
/// A missing file is an empty store. Malformed lines are skipped.
pub fn read_rows(path: &Path) -> Result<Vec<RawRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<RawRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse row at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} rows from {:?}", records.len(), path);
    Ok(records)
}

// ============================================================================
// Selection
// ============================================================================

/// The configured source, chosen at runtime
#[derive(Clone, Debug)]
pub enum AnySource {
    Http(HttpSource),
    Local(JsonlSource),
}

impl AnySource {
    /// Pick a source from config, optionally overridden by a URL or path
    pub fn from_config(config: &SourceConfig, override_location: Option<&str>) -> Result<Self> {
        let source = match override_location.or(config.endpoint.as_deref()) {
            Some(location) if is_url(location) => AnySource::Http(HttpSource::new(location)?),
            Some(location) if override_location.is_some() => {
                AnySource::Local(JsonlSource::new(location))
            }
            _ => AnySource::Local(JsonlSource::new(&config.local_path)),
        };
        Ok(source)
    }

    /// Where rows are read from, for messages
    pub fn describe(&self) -> String {
        match self {
            AnySource::Http(s) => s.endpoint().to_string(),
            AnySource::Local(s) => s.path().display().to_string(),
        }
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

impl MeasurementSource for AnySource {
    async fn fetch_records(&self) -> Result<Vec<RawRecord>> {
        match self {
            AnySource::Http(s) => s.fetch_records().await,
            AnySource::Local(s) => s.fetch_records().await,
        }
    }

    async fn append_record(&self, record: &RawRecord) -> Result<()> {
        match self {
            AnySource::Http(s) => s.append_record(record).await,
            AnySource::Local(s) => s.append_record(record).await,
        }
    }
}
