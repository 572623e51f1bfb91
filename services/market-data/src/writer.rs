//! Rotating daily store writer
//!
//! Turns the per-pair stream of delta records into one JSON-array file
//! per Asia/Tokyo calendar day. The open day lives under
//! `tmp/<pair>/<pair>_<YYYYMMDD>.json` as a `[`-bracketed,
//! comma-separated array without its closing bracket; when a record
//! for a newer day arrives, the file is closed with `]` and compressed
//! to `stream/<pair>/<pair>_<YYYYMMDD>.json.gz`, so every finalized
//! archive is a valid JSON array. A temp file that survives a crash is
//! reopened in append mode and finalized at the next rotation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use types::{CurrencyPair, StoreData};

const WRITE_BUF_SIZE: usize = 16 * 1024;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Path of the open day file for `(pair, day)`.
pub fn tmp_path(data_root: &Path, pair: &CurrencyPair, day: NaiveDate) -> PathBuf {
    data_root
        .join("tmp")
        .join(pair.as_str())
        .join(format!("{}_{}.json", pair, day.format("%Y%m%d")))
}

/// Path of the finalized compressed archive for `(pair, day)`.
pub fn archive_path(data_root: &Path, pair: &CurrencyPair, day: NaiveDate) -> PathBuf {
    data_root
        .join("stream")
        .join(pair.as_str())
        .join(format!("{}_{}.json.gz", pair, day.format("%Y%m%d")))
}

struct DayFile {
    day: NaiveDate,
    nonempty: bool,
    w: BufWriter<File>,
}

/// Writer for one pair's daily record files, rotation included.
pub struct StoreWriter {
    data_root: PathBuf,
    pair: CurrencyPair,
    open: Option<DayFile>,
}

impl StoreWriter {
    pub fn new(data_root: impl Into<PathBuf>, pair: CurrencyPair) -> Self {
        Self {
            data_root: data_root.into(),
            pair,
            open: None,
        }
    }

    /// Append one record, opening or rotating the day file as needed.
    ///
    /// A failed open leaves the writer without a file; the next record
    /// retries, so a transient filesystem problem costs only the
    /// records that arrived while it lasted.
    pub fn append(&mut self, sd: &StoreData) -> Result<(), StoreError> {
        let day = sd.tokyo_day();

        match &self.open {
            None => {
                self.open = Some(self.open_day(day)?);
            }
            Some(current) if current.day != day => {
                self.finalize_current()?;
                self.open = Some(self.open_day(day)?);
            }
            Some(_) => {}
        }

        let file = self.open.as_mut().expect("day file just ensured");
        if file.nonempty {
            file.w.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut file.w, sd)?;
        file.nonempty = true;
        Ok(())
    }

    /// Close the current day file without compressing it. The next
    /// process invocation appends to it; only day rotation finalizes.
    pub fn close(&mut self) -> Result<(), StoreError> {
        if let Some(mut file) = self.open.take() {
            file.w.flush()?;
        }
        Ok(())
    }

    fn open_day(&self, day: NaiveDate) -> Result<DayFile, StoreError> {
        let path = tmp_path(&self.data_root, &self.pair, day);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        match fs::metadata(&path) {
            Err(_) => {
                let fp = File::create(&path)?;
                let mut w = BufWriter::with_capacity(WRITE_BUF_SIZE, fp);
                w.write_all(b"[")?;
                // Keep the file a recognizable array even if we crash
                // before the first record.
                w.flush()?;
                Ok(DayFile {
                    day,
                    nonempty: false,
                    w,
                })
            }
            Ok(meta) => {
                let fp = OpenOptions::new().append(true).open(&path)?;
                Ok(DayFile {
                    day,
                    nonempty: meta.len() > 2,
                    w: BufWriter::with_capacity(WRITE_BUF_SIZE, fp),
                })
            }
        }
    }

    /// Write the closing bracket, close the temp file, and compress it
    /// into the archive tree. A failed compression is logged and does
    /// not block the next day's file; the temp file stays on disk
    /// either way.
    fn finalize_current(&mut self) -> Result<(), StoreError> {
        let Some(mut file) = self.open.take() else {
            return Ok(());
        };
        file.w.write_all(b"]")?;
        file.w.flush()?;
        drop(file.w);

        if let Err(e) = self.compress_day(file.day) {
            warn!(
                pair = %self.pair,
                day = %file.day,
                error = %e,
                "failed to compress finished day file"
            );
        }
        Ok(())
    }

    fn compress_day(&self, day: NaiveDate) -> Result<(), StoreError> {
        let src = tmp_path(&self.data_root, &self.pair, day);
        let dst = archive_path(&self.data_root, &self.pair, day);
        if let Some(dir) = dst.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut input = File::open(&src)?;
        let output = File::create(&dst)?;
        let mut gz = GzEncoder::new(output, Compression::fast());
        io::copy(&mut input, &mut gz)?;
        gz.finish()?;
        Ok(())
    }
}

/// Drain the persist channel into daily files until shutdown.
pub async fn run_store_writer(
    data_root: PathBuf,
    pair: CurrencyPair,
    mut records: mpsc::Receiver<StoreData>,
    shutdown: CancellationToken,
) {
    let mut store = StoreWriter::new(data_root, pair.clone());
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                if let Err(e) = store.close() {
                    warn!(pair = %pair, error = %e, "failed to close day file");
                }
                info!(pair = %pair, "store writer stopped");
                return;
            }
            maybe = records.recv() => match maybe {
                Some(sd) => {
                    if let Err(e) = store.append(&sd) {
                        warn!(pair = %pair, error = %e, "failed to persist record");
                    }
                }
                None => {
                    let _ = store.close();
                    return;
                }
            }
        }
    }
}
