//! Restart buffer: durable ring snapshot
//!
//! On shutdown each state actor serializes its ring to
//! `tmp/<pair>_buffer.bin`; on startup the ring is reseeded from it if
//! present and intact. The format is versioned and integrity-checked:
//!
//! ```text
//! [magic: b"ZBUF"]
//! [version: u32 LE]
//! [sha256: 32 bytes]   // over the body
//! [body: bincode Vec<BufferedRecord>]
//! ```
//!
//! Any defect (missing file, short file, wrong magic or version, hash
//! mismatch, undecodable body) is reported as an error; the caller
//! starts with an empty ring.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use types::{CurrencyPair, PriceLevel, StoreData, Trade};

use crate::ring::Ring;

/// Current buffer format version.
pub const BUFFER_VERSION: u32 = 1;

const MAGIC: &[u8; 4] = b"ZBUF";
const HEADER_LEN: usize = 4 + 4 + 32;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("buffer file too short: {0} bytes")]
    Truncated(usize),

    #[error("not a buffer file (bad magic)")]
    BadMagic,

    #[error("unsupported buffer version: {0}")]
    UnsupportedVersion(u32),

    #[error("integrity check failed")]
    IntegrityFailure,
}

/// Fixed-layout record for the binary snapshot.
///
/// `StoreData`'s JSON shape omits absent options, which a
/// non-self-describing encoding cannot round-trip, so the buffer keeps
/// its own record layout and converts at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BufferedRecord {
    ask: Option<PriceLevel>,
    bid: Option<PriceLevel>,
    trade: Option<Trade>,
    timestamp: i64,
}

impl From<&StoreData> for BufferedRecord {
    fn from(sd: &StoreData) -> Self {
        Self {
            ask: sd.ask,
            bid: sd.bid,
            trade: sd.trade.clone(),
            timestamp: sd.timestamp,
        }
    }
}

impl From<BufferedRecord> for StoreData {
    fn from(r: BufferedRecord) -> Self {
        Self {
            ask: r.ask,
            bid: r.bid,
            trade: r.trade,
            timestamp: r.timestamp,
        }
    }
}

/// Path of the restart buffer for a pair under the data root.
pub fn buffer_path(data_root: &Path, pair: &CurrencyPair) -> PathBuf {
    data_root.join("tmp").join(format!("{}_buffer.bin", pair))
}

/// Serialize the ring to `path`, creating parent directories as needed.
pub fn write_buffer(path: &Path, ring: &Ring) -> Result<(), BufferError> {
    let records: Vec<BufferedRecord> = ring.iter().map(BufferedRecord::from).collect();
    let body = bincode::serialize(&records).map_err(|e| BufferError::Encoding(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&body);
    let hash = hasher.finalize();

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&BUFFER_VERSION.to_le_bytes());
    out.extend_from_slice(&hash);
    out.extend_from_slice(&body);

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, out)?;
    Ok(())
}

/// Read a buffer file back into a ring with the given capacity.
pub fn read_buffer(path: &Path, capacity: usize) -> Result<Ring, BufferError> {
    let data = fs::read(path)?;
    if data.len() < HEADER_LEN {
        return Err(BufferError::Truncated(data.len()));
    }

    if &data[0..4] != MAGIC {
        return Err(BufferError::BadMagic);
    }

    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != BUFFER_VERSION {
        return Err(BufferError::UnsupportedVersion(version));
    }

    let stored_hash = &data[8..HEADER_LEN];
    let body = &data[HEADER_LEN..];

    let mut hasher = Sha256::new();
    hasher.update(body);
    if hasher.finalize().as_slice() != stored_hash {
        return Err(BufferError::IntegrityFailure);
    }

    let records: Vec<BufferedRecord> =
        bincode::deserialize(body).map_err(|e| BufferError::Encoding(e.to_string()))?;

    let mut ring = Ring::with_capacity(capacity);
    ring.refill(records.into_iter().map(StoreData::from).collect());
    Ok(ring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::STORE_MAX;
    use tempfile::TempDir;

    fn sample_ring() -> Ring {
        let mut ring = Ring::with_capacity(STORE_MAX);
        ring.push(StoreData {
            ask: Some(PriceLevel(100.0, 1.0)),
            bid: Some(PriceLevel(99.0, 2.0)),
            trade: Some(Trade {
                currency_pair: "btc_jpy".to_string(),
                trade_type: "bid".to_string(),
                price: 99.5,
                tid: 7,
                amount: 0.5,
                date: 1000,
            }),
            timestamp: 1577804400,
        });
        ring.push(StoreData {
            bid: Some(PriceLevel(99.0, 3.0)),
            timestamp: 1577804401,
            ..StoreData::default()
        });
        ring
    }

    #[test]
    fn test_roundtrip_identical() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("btc_jpy_buffer.bin");

        let ring = sample_ring();
        write_buffer(&path, &ring).unwrap();
        let back = read_buffer(&path, STORE_MAX).unwrap();

        assert_eq!(back, ring);
    }

    #[test]
    fn test_roundtrip_empty_ring() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x_buffer.bin");

        write_buffer(&path, &Ring::new()).unwrap();
        let back = read_buffer(&path, STORE_MAX).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = read_buffer(&tmp.path().join("nope.bin"), STORE_MAX);
        assert!(matches!(result, Err(BufferError::Io(_))));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("short.bin");
        fs::write(&path, b"ZBUF").unwrap();

        let result = read_buffer(&path, STORE_MAX);
        assert!(matches!(result, Err(BufferError::Truncated(4))));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.bin");

        write_buffer(&path, &sample_ring()).unwrap();
        let mut data = fs::read(&path).unwrap();
        data[0] = b'X';
        fs::write(&path, data).unwrap();

        assert!(matches!(
            read_buffer(&path, STORE_MAX),
            Err(BufferError::BadMagic)
        ));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ver.bin");

        write_buffer(&path, &sample_ring()).unwrap();
        let mut data = fs::read(&path).unwrap();
        data[4] = 99;
        fs::write(&path, data).unwrap();

        assert!(matches!(
            read_buffer(&path, STORE_MAX),
            Err(BufferError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_tampered_body_fails_integrity() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tamper.bin");

        write_buffer(&path, &sample_ring()).unwrap();
        let mut data = fs::read(&path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        fs::write(&path, data).unwrap();

        assert!(matches!(
            read_buffer(&path, STORE_MAX),
            Err(BufferError::IntegrityFailure)
        ));
    }

    #[test]
    fn test_reload_respects_smaller_capacity() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cap.bin");

        let mut ring = Ring::with_capacity(STORE_MAX);
        for ts in 0..10 {
            ring.push(StoreData {
                ask: Some(PriceLevel(ts as f64, 1.0)),
                timestamp: ts,
                ..StoreData::default()
            });
        }
        write_buffer(&path, &ring).unwrap();

        let back = read_buffer(&path, 4).unwrap();
        assert_eq!(back.len(), 4);
        // Newest records survive.
        assert_eq!(back.iter().next().unwrap().timestamp, 6);
    }

    #[test]
    fn test_buffer_path_layout() {
        let p = buffer_path(Path::new("data"), &CurrencyPair::new("eth_jpy"));
        assert_eq!(p, PathBuf::from("data/tmp/eth_jpy_buffer.bin"));
    }
}
