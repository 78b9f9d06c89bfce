//! Append-only store of individual latency samples, kept alongside the
//! histogram when raw collection is enabled and exported as CSV at phase
//! end.

use std::fmt::Write as _;
use std::io;

use crate::BenchResult;

/// Samples the log is pre-sized for; growth beyond this doubles capacity.
pub const DEFAULT_CAPACITY: usize = 1_000_000;

#[derive(Debug, Clone)]
pub struct RawLog {
    data: Vec<f64>,
    base_capacity: usize,
}

impl Default for RawLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RawLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            base_capacity: capacity,
        }
    }

    /// Drop all samples and return to the pre-sized buffer.
    pub fn clear(&mut self) {
        self.data = Vec::with_capacity(self.base_capacity);
    }

    /// Append one sample, doubling capacity when full. Earlier samples are
    /// preserved unchanged; capacity never shrinks between clears.
    pub fn add(&mut self, value: f64) {
        if self.data.len() == self.data.capacity() {
            self.data.reserve_exact(self.data.capacity().max(1));
        }
        self.data.push(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn samples(&self) -> &[f64] {
        &self.data
    }

    /// One sample per line, 4 decimal places.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for value in &self.data {
            let _ = writeln!(out, "{value:.4}");
        }
        out
    }

    /// `num,time` header plus one `index,value` row per sample.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> BenchResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["num", "time"])?;
        for (index, value) in self.data.iter().enumerate() {
            csv_writer.write_record([index.to_string(), format!("{value:.4}")])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_preserves_samples() {
        let mut log = RawLog::with_capacity(4);
        for i in 0..100 {
            log.add(i as f64 * 1.5);
        }
        assert_eq!(log.len(), 100);
        for (i, v) in log.samples().iter().enumerate() {
            assert_eq!(*v, i as f64 * 1.5);
        }
        // Doubling from 4: 4 -> 8 -> 16 -> 32 -> 64 -> 128.
        assert_eq!(log.capacity(), 128);
    }

    #[test]
    fn test_clear_resets_position_and_capacity() {
        let mut log = RawLog::with_capacity(2);
        for i in 0..50 {
            log.add(i as f64);
        }
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.capacity(), 2);
    }

    #[test]
    fn test_to_text_format() {
        let mut log = RawLog::with_capacity(4);
        log.add(12.5);
        log.add(0.125);
        assert_eq!(log.to_text(), "12.5000\n0.1250\n");
    }

    #[test]
    fn test_csv_row_count_and_header() {
        let mut log = RawLog::with_capacity(4);
        for i in 0..10 {
            log.add(i as f64 + 0.25);
        }
        let mut out = Vec::new();
        log.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "num,time");
        assert_eq!(lines[1], "0,0.2500");
        assert_eq!(lines[10], "9,9.2500");
    }
}
