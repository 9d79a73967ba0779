use serde::{Deserialize, Serialize};

use crate::cards::CardId;

/// How a two-card turn resolved.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnResult {
    /// Both cards share a value and are now matched
    Match,
    /// Values differ; one attempt was spent
    Mismatch,
}

/// Record of one evaluated turn.
/// Serialized to JSONL by [`TurnLogger`] for diagnostics.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based turn number since the last start/reset
    pub turn: u32,
    /// Ids of the two flipped cards, in flip order
    pub cards: [CardId; 2],
    /// Values of the two flipped cards, in flip order
    pub values: [String; 2],
    pub result: TurnResult,
    /// Attempt budget remaining after this turn
    pub attempts_left: u32,
    /// Timestamp when the line was written (RFC3339 format)
    #[serde(default)]
    pub ts: Option<String>,
    /// Host-supplied context such as a session id
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

use chrono::{SecondsFormat, Utc};
use std::fs::{create_dir_all, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct TurnLogger {
    writer: Box<dyn Write + Send>,
    lines: u64,
}

impl std::fmt::Debug for TurnLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnLogger")
            .field("lines", &self.lines)
            .finish()
    }
}

impl TurnLogger {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(BufWriter::new(f)))
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
            lines: 0,
        }
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn write(&mut self, record: &TurnRecord) -> std::io::Result<()> {
        // inject timestamp if missing
        let mut rec = record.clone();
        if rec.ts.is_none() {
            rec.ts = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        let line = serde_json::to_string(&rec).map_err(std::io::Error::other)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.lines += 1;
        Ok(())
    }
}
