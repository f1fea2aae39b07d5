use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::detection::domain::landmarks::LandmarkSet;
use crate::detection::domain::perceiver::{PerceptionError, Perceiver};
use crate::shared::frame::Frame;

/// Replays recorded landmarks, one JSON [`LandmarkSet`] per line.
///
/// Frames are mapped to records in call order and the recording loops at
/// the end, so a short capture can drive an indefinitely running pipeline.
/// Blank lines are skipped.
pub struct ReplayPerceiver {
    records: Vec<LandmarkSet>,
    cursor: usize,
    last_timestamp: Option<u64>,
}

impl ReplayPerceiver {
    pub fn new(records: Vec<LandmarkSet>) -> Self {
        Self {
            records,
            cursor: 0,
            last_timestamp: None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, PerceptionError> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line)
                .map_err(|source| PerceptionError::Parse { line: i + 1, source })?;
            records.push(record);
        }
        log::info!("Loaded {} landmark records from {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Perceiver for ReplayPerceiver {
    fn perceive(&mut self, frame: &Frame) -> Result<LandmarkSet, PerceptionError> {
        let ts = frame.timestamp_ms();
        if let Some(last) = self.last_timestamp {
            if ts <= last {
                return Err(PerceptionError::Backend(format!(
                    "timestamp {ts} is not after previous {last}"
                )));
            }
        }
        self.last_timestamp = Some(ts);

        if self.records.is_empty() {
            return Ok(LandmarkSet::empty());
        }
        let record = self.records[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.records.len();
        Ok(record)
    }
}
