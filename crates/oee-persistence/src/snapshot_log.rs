//! ---
//! oee_section: "03-persistence-logging"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Append-only JSON-lines log of cell OEE snapshots."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use oee_sim::TelemetryFrame;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{PersistenceError, Result};

/// Destination for the periodic snapshot batch.
///
/// Called from a blocking context; implementations may perform synchronous I/O.
pub trait SnapshotSink: Send + Sync {
    /// Persist one batch of frames, returning how many records were written.
    fn record(&self, frames: &[TelemetryFrame]) -> Result<usize>;
}

/// One persisted row: a cell's sub-metrics and sensors at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Sequential identifier assigned when appending.
    pub sequence: u64,
    /// Cell the row belongs to.
    pub cell_id: String,
    /// Availability percentage.
    pub availability: f64,
    /// Performance percentage.
    pub performance: f64,
    /// Quality percentage.
    pub quality: f64,
    /// Composite OEE percentage.
    pub oee: f64,
    /// Ambient temperature in °C.
    pub temperature: f64,
    /// Vibration amplitude.
    pub vibration: f64,
    /// Frame timestamp.
    pub recorded_at: DateTime<Utc>,
}

impl SnapshotRecord {
    /// Project a telemetry frame onto a row; the sequence is assigned on append.
    pub fn from_frame(frame: &TelemetryFrame) -> Self {
        Self {
            sequence: 0,
            cell_id: frame.id.clone(),
            availability: frame.oee.availability,
            performance: frame.oee.performance,
            quality: frame.oee.quality,
            oee: frame.oee.global,
            temperature: frame.sensors.temperature,
            vibration: frame.sensors.vibration,
            recorded_at: frame.timestamp,
        }
    }
}

struct LogState {
    file: File,
    next_sequence: u64,
}

/// Append-only JSON-lines snapshot log.
pub struct JsonlSnapshotLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl JsonlSnapshotLog {
    /// Open the log for appending, continuing the sequence of an existing file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let next_sequence = if path.exists() {
            determine_last_sequence(path)?
        } else {
            0
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(LogState {
                file,
                next_sequence,
            }),
        })
    }

    /// Append a single record, returning its sequence number and byte count.
    pub fn append(&self, mut record: SnapshotRecord) -> Result<(u64, usize)> {
        let mut state = self.state.lock();
        record.sequence = state.next_sequence + 1;
        let mut buffer = Vec::new();
        encode_line(&mut buffer, &record)?;
        commit(&mut state.file, &buffer)?;
        state.next_sequence = record.sequence;
        Ok((record.sequence, buffer.len()))
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for JsonlSnapshotLog {
    fn record(&self, frames: &[TelemetryFrame]) -> Result<usize> {
        let mut state = self.state.lock();
        let mut buffer = Vec::new();
        let mut sequence = state.next_sequence;
        for frame in frames {
            sequence += 1;
            let mut record = SnapshotRecord::from_frame(frame);
            record.sequence = sequence;
            encode_line(&mut buffer, &record)?;
        }
        commit(&mut state.file, &buffer)?;
        state.next_sequence = sequence;
        debug!(records = frames.len(), bytes = buffer.len(), path = %self.path.display(), "snapshots persisted");
        Ok(frames.len())
    }
}

fn encode_line(buffer: &mut Vec<u8>, record: &SnapshotRecord) -> Result<()> {
    serde_json::to_writer(&mut *buffer, record)?;
    buffer.push(b'\n');
    Ok(())
}

/// Write a fully encoded batch. Sequence numbers are only committed by the caller on success.
fn commit<W: Write>(writer: &mut W, buffer: &[u8]) -> Result<()> {
    writer.write_all(buffer)?;
    writer.flush()?;
    Ok(())
}

fn determine_last_sequence(path: &Path) -> Result<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut last_seq = 0u64;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_str::<SnapshotRecord>(&line) {
            last_seq = record.sequence;
        }
    }
    Ok(last_seq)
}

/// Replay the log in order, invoking the callback for each record.
pub fn replay<F>(path: &Path, mut handler: F) -> Result<usize>
where
    F: FnMut(SnapshotRecord) -> Result<()>,
{
    let mut count = 0usize;
    for record in SnapshotLogReader::open(path)? {
        handler(record?)?;
        count += 1;
    }
    Ok(count)
}

/// Streaming iterator over the records of a snapshot log.
pub struct SnapshotLogReader {
    lines: std::io::Lines<BufReader<File>>,
}

impl SnapshotLogReader {
    /// Open the log for sequential reading.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Iterator for SnapshotLogReader {
    type Item = Result<SnapshotRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lines.next()? {
            Ok(line) if line.trim().is_empty() => self.next(),
            Ok(line) => Some(serde_json::from_str(&line).map_err(PersistenceError::from)),
            Err(err) => Some(Err(err.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oee_sim::{Cell, CellConfig};
    use tempfile::tempdir;

    fn frame(id: &str) -> TelemetryFrame {
        let now = Utc::now();
        Cell::new(CellConfig::new(id, format!("cell {id}")), now).telemetry_frame(now)
    }

    #[test]
    fn batch_is_written_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshots.jsonl");
        let log = JsonlSnapshotLog::open(&path).unwrap();
        assert_eq!(log.record(&[frame("C01"), frame("C02")]).unwrap(), 2);

        let ids: Vec<_> = SnapshotLogReader::open(&path)
            .unwrap()
            .map(|record| record.unwrap().cell_id)
            .collect();
        assert_eq!(ids, vec!["C01", "C02"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_batch_does_not_consume_sequence_numbers() {
        let full = OpenOptions::new().write(true).open("/dev/full").unwrap();
        let log = JsonlSnapshotLog {
            path: PathBuf::from("/dev/full"),
            state: Mutex::new(LogState {
                file: full,
                next_sequence: 7,
            }),
        };
        assert!(matches!(
            log.record(&[frame("C01"), frame("C02")]),
            Err(PersistenceError::Io(_))
        ));
        assert_eq!(log.state.lock().next_sequence, 7);
    }

    #[test]
    fn batch_sequences_are_contiguous_across_batches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshots.jsonl");
        let log = JsonlSnapshotLog::open(&path).unwrap();
        log.record(&[frame("C01"), frame("C02")]).unwrap();
        log.record(&[]).unwrap();
        log.record(&[frame("C03")]).unwrap();

        let sequences: Vec<_> = SnapshotLogReader::open(&path)
            .unwrap()
            .map(|record| record.unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        let (next, _) = log
            .append(SnapshotRecord::from_frame(&frame("C04")))
            .unwrap();
        assert_eq!(next, 4);
    }

    #[test]
    fn reopen_continues_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/snapshots.jsonl");
        {
            let log = JsonlSnapshotLog::open(&path).unwrap();
            log.record(&[frame("C01")]).unwrap();
        }
        let log = JsonlSnapshotLog::open(&path).unwrap();
        let (sequence, bytes) = log
            .append(SnapshotRecord::from_frame(&frame("C02")))
            .unwrap();
        assert_eq!(sequence, 2);
        assert!(bytes > 0);
    }
}
