//! Output sink handed module results and text.

use bofrt_contracts::{CALLBACK_ERROR, CALLBACK_OUTPUT, CALLBACK_OUTPUT_OEM};

use crate::builder::FormatBuilder;
use crate::cursor::BufferCursor;
use crate::error::{DecodeError, FormatError};
use crate::printf::{self, PrintfArg};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OutputCategory {
    Output = CALLBACK_OUTPUT,
    /// Raw bytes in the host's alternate (OEM) text encoding.
    OutputOem = CALLBACK_OUTPUT_OEM,
    Error = CALLBACK_ERROR,
}

impl OutputCategory {
    pub fn from_raw(tag: i32) -> Option<Self> {
        match tag {
            CALLBACK_OUTPUT => Some(OutputCategory::Output),
            CALLBACK_OUTPUT_OEM => Some(OutputCategory::OutputOem),
            CALLBACK_ERROR => Some(OutputCategory::Error),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputCategory::Output => "output",
            OutputCategory::OutputOem => "output-oem",
            OutputCategory::Error => "error",
        }
    }
}

pub trait OutputChannel {
    fn output(&mut self, category: OutputCategory, data: &[u8]);

    /// Renders `template` and emits the text. On a rendering error nothing is
    /// emitted.
    fn printf(
        &mut self,
        category: OutputCategory,
        template: &str,
        args: &[PrintfArg<'_>],
    ) -> Result<(), FormatError> {
        let text = printf::render(template, args)?;
        self.output(category, text.as_bytes());
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputRecord {
    pub category: OutputCategory,
    pub data: Vec<u8>,
}

/// In-memory channel the host drains between invocations.
#[derive(Clone, Debug)]
pub struct OutputBuffer {
    records: Vec<OutputRecord>,
    bytes: usize,
    max_bytes: usize,
    truncated: bool,
}

impl OutputBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            records: Vec::new(),
            bytes: 0,
            max_bytes,
            truncated: false,
        }
    }

    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    pub fn buffered_bytes(&self) -> usize {
        self.bytes
    }

    /// True if output was cut at the byte ceiling since the last drain.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    pub fn drain(&mut self) -> Vec<OutputRecord> {
        self.bytes = 0;
        self.truncated = false;
        std::mem::take(&mut self.records)
    }

    /// Drains every record as a stream of `int category, blob data`.
    pub fn drain_encoded(&mut self) -> Vec<u8> {
        let records = self.drain();
        let size: usize = records.iter().map(|r| 8 + r.data.len()).sum();
        let mut out = FormatBuilder::allocate(size);
        for record in &records {
            out.append_int(record.category.as_raw());
            // Record sizes are bounded by a u32 ceiling.
            if out.append_blob(&record.data).is_err() {
                log::error!("output record of {} bytes dropped", record.data.len());
            }
        }
        out.into_vec()
    }
}

impl OutputChannel for OutputBuffer {
    fn output(&mut self, category: OutputCategory, data: &[u8]) {
        let room = self.max_bytes.saturating_sub(self.bytes);
        let take = data.len().min(room);
        if take < data.len() {
            if !self.truncated {
                log::warn!(
                    "output ceiling of {} bytes reached; {} bytes cut",
                    self.max_bytes,
                    data.len() - take
                );
            }
            self.truncated = true;
        }
        if take == 0 {
            return;
        }
        self.bytes += take;
        match self.records.last_mut() {
            Some(last) if last.category == category => last.data.extend_from_slice(&data[..take]),
            _ => self.records.push(OutputRecord {
                category,
                data: data[..take].to_vec(),
            }),
        }
    }
}

/// Parses a stream produced by [`OutputBuffer::drain_encoded`].
pub fn decode_records(stream: &[u8]) -> Result<Vec<(i32, &[u8])>, DecodeError> {
    let mut cursor = BufferCursor::parse(stream);
    let mut out = Vec::new();
    while !cursor.is_exhausted() {
        let category = cursor.read_int()?;
        let data = cursor.extract_blob()?;
        out.push((category, data));
    }
    Ok(out)
}
