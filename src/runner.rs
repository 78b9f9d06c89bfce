//! Benchmark runner: parses the benchmark name list, drives write and read
//! phases against the storage adapter, and records per-operation latency
//! into the histogram and raw log.
//!
//! The runner is the single owner of all run state (no ambient globals):
//! the adapter, the process-lifetime PRNG and value generator, and the
//! per-phase histogram/raw-log/progress counters. One PRNG stream spans all
//! benchmarks in a run, so a given seed reproduces the exact same keys and
//! values across the whole invocation.

use std::io::{self, Write};
use std::time::Instant;

use tracing::{debug, warn};

use crate::adapters::StorageAdapter;
use crate::histogram::Histogram;
use crate::random::{Lcg, ValueGenerator};
use crate::rawlog::RawLog;
use crate::{BenchError, BenchResult, LatencySnapshot, RunSummary, KEY_SIZE};

/// Seed for the run-wide pseudo-random stream.
const RAND_SEED: u32 = 301;

/// Operations slower than this (microseconds) are flagged to diagnostics.
const SLOW_OP_MICROS: f64 = 20_000.0;

/// First progress report fires at this many completed operations.
const FIRST_REPORT: usize = 100;

// ────────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────────

/// Harness-level configuration. Backend tuning (page size, cache, paths)
/// lives in [`crate::adapters::StorageOptions`].
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Comma-separated benchmark names, run in order.
    pub benchmarks: String,
    /// Number of key/value pairs to place in the database.
    pub num: usize,
    /// Number of read operations; negative means `num` reads.
    pub reads: i64,
    /// Size of each value in bytes.
    pub value_size: usize,
    /// Fraction of each value that stays incompressible, in [0, 1].
    pub compression_ratio: f64,
    /// Collect and print a latency histogram per benchmark.
    pub histogram: bool,
    /// Collect raw per-operation samples and emit them as CSV on stdout.
    pub raw: bool,
    /// Preserve the existing database; fresh-fill benchmarks are skipped.
    pub use_existing_db: bool,
    /// Bracket batched phases in backend transactions.
    pub transaction: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            benchmarks: "fillseq,fillseqsync,fillseqbatch,fillrandom,fillrandsync,\
                         fillrandbatch,overwrite,overwritebatch,readrandom,readseq"
                .into(),
            num: 1_000_000,
            reads: -1,
            value_size: 100,
            compression_ratio: 0.5,
            histogram: false,
            raw: false,
            use_existing_db: false,
            transaction: true,
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> BenchResult<()> {
        if self.value_size == 0 {
            return Err(BenchError::Config("value size must be positive".into()));
        }
        Ok(())
    }

    /// Effective read count: `reads` when non-negative, else `num`.
    pub fn effective_reads(&self) -> usize {
        if self.reads < 0 {
            self.num
        } else {
            self.reads as usize
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Sequential,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbState {
    Fresh,
    Existing,
}

/// Next progress-report threshold: the step widens as the count grows so
/// reporting stays roughly logarithmic in run length.
pub fn advance_report_threshold(current: usize) -> usize {
    if current < 1_000 {
        current + 100
    } else if current < 5_000 {
        current + 500
    } else if current < 10_000 {
        current + 1_000
    } else if current < 50_000 {
        current + 5_000
    } else if current < 100_000 {
        current + 10_000
    } else if current < 500_000 {
        current + 50_000
    } else {
        current + 100_000
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Runner
// ────────────────────────────────────────────────────────────────────────────────

pub struct Runner<A: StorageAdapter> {
    config: BenchConfig,
    adapter: A,
    rng: Lcg,
    gen: ValueGenerator,
    hist: Histogram,
    raw: RawLog,
    start: Instant,
    last_op_finish: Instant,
    bytes: u64,
    done: usize,
    next_report: usize,
    message: String,
    summaries: Vec<RunSummary>,
}

impl<A: StorageAdapter> Runner<A> {
    pub fn new(config: BenchConfig, adapter: A) -> BenchResult<Self> {
        config.validate()?;
        let mut rng = Lcg::new(RAND_SEED);
        let gen =
            ValueGenerator::compressible(&mut rng, config.compression_ratio, config.value_size)?;
        let now = Instant::now();
        Ok(Self {
            config,
            adapter,
            rng,
            gen,
            hist: Histogram::new(),
            raw: RawLog::new(),
            start: now,
            last_op_finish: now,
            bytes: 0,
            done: 0,
            next_report: FIRST_REPORT,
            message: String::new(),
            summaries: Vec::new(),
        })
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn summaries(&self) -> &[RunSummary] {
        &self.summaries
    }

    /// Open storage and run every name in the benchmark list in order.
    /// Unrecognized names are reported and skipped; empty names are ignored
    /// silently. Any adapter error aborts the run.
    pub fn run(&mut self) -> BenchResult<()> {
        self.adapter.open()?;

        let list = self.config.benchmarks.clone();
        for name in list.split(',') {
            if name.is_empty() {
                continue;
            }
            self.bytes = 0;
            self.start_phase();
            if self.dispatch(name)? {
                self.stop_phase(name)?;
            }
        }
        self.adapter.close()
    }

    /// Run one named benchmark. Returns whether the name was recognized.
    fn dispatch(&mut self, name: &str) -> BenchResult<bool> {
        use DbState::{Existing, Fresh};
        use Order::{Random, Sequential};

        let num = self.config.num;
        let value_size = self.config.value_size;

        match name {
            "fillseq" => {
                self.write_phase(false, Sequential, Fresh, num, value_size, 1)?;
                self.adapter.checkpoint()?;
            }
            "fillseqbatch" => {
                self.write_phase(false, Sequential, Fresh, num, value_size, 1000)?;
                self.adapter.checkpoint()?;
            }
            "fillrandom" => {
                self.write_phase(false, Random, Fresh, num, value_size, 1)?;
                self.adapter.checkpoint()?;
            }
            "fillrandbatch" => {
                self.write_phase(false, Random, Fresh, num, value_size, 1000)?;
                self.adapter.checkpoint()?;
            }
            "overwrite" => {
                self.write_phase(false, Random, Existing, num, value_size, 1)?;
                self.adapter.checkpoint()?;
            }
            "overwritebatch" => {
                self.write_phase(false, Random, Existing, num, value_size, 1000)?;
                self.adapter.checkpoint()?;
            }
            "fillseqsync" => {
                self.write_phase(true, Sequential, Fresh, num / 100, value_size, 1)?;
                self.adapter.checkpoint()?;
            }
            "fillrandsync" => {
                self.write_phase(true, Random, Fresh, num / 100, value_size, 1)?;
                self.adapter.checkpoint()?;
            }
            "fillrand100K" => {
                self.write_phase(false, Random, Fresh, num / 1000, 100_000, 1)?;
                self.adapter.checkpoint()?;
            }
            "fillseq100K" => {
                self.write_phase(false, Sequential, Fresh, num / 1000, 100_000, 1)?;
                self.adapter.checkpoint()?;
            }
            "readseq" => {
                self.read_phase(Sequential, 1, self.config.effective_reads())?;
            }
            "readrandom" => {
                self.read_phase(Random, 1, self.config.effective_reads())?;
            }
            "readrand100K" => {
                self.read_phase(Random, 1, self.config.effective_reads() / 1000)?;
            }
            _ => {
                warn!("unknown benchmark '{name}'");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Reset all per-phase state and timers.
    fn start_phase(&mut self) {
        self.start = Instant::now();
        self.last_op_finish = self.start;
        self.bytes = 0;
        self.message.clear();
        self.hist.clear();
        self.raw.clear();
        self.done = 0;
        self.next_report = FIRST_REPORT;
    }

    fn write_phase(
        &mut self,
        durable: bool,
        order: Order,
        state: DbState,
        num_entries: usize,
        value_size: usize,
        batch: usize,
    ) -> BenchResult<()> {
        if state == DbState::Fresh {
            if self.config.use_existing_db {
                self.message = "skipping (--use-existing-db is true)".into();
                return Ok(());
            }
            debug!("reopening fresh database");
            self.adapter.close()?;
            self.adapter.open()?;
            self.start_phase();
        }

        if num_entries != self.config.num {
            self.message = format!("({num_entries} ops)");
        }

        let transaction = batch > 1;
        let mut i = 0;
        while i < num_entries {
            if self.config.transaction && transaction {
                self.adapter.begin_transaction()?;
            }
            for j in 0..batch {
                let value = self.gen.generate(value_size);
                let index = match order {
                    Order::Sequential => i + j,
                    Order::Random => self.rng.uniform(num_entries as u32) as usize,
                };
                let key = entry_key(index);
                self.bytes += (value_size + key.len()) as u64;
                self.adapter.write(key.as_bytes(), &value, durable)?;
                self.finished_single_op();
            }
            if self.config.transaction && transaction {
                self.adapter.end_transaction()?;
            }
            i += batch;
        }
        Ok(())
    }

    fn read_phase(&mut self, order: Order, batch: usize, reads: usize) -> BenchResult<()> {
        let transaction = batch > 1;
        let mut i = 0;
        while i < reads {
            if self.config.transaction && transaction {
                self.adapter.begin_transaction()?;
            }
            for j in 0..batch {
                let index = match order {
                    Order::Sequential => i + j,
                    Order::Random => self.rng.uniform(reads as u32) as usize,
                };
                let key = entry_key(index);
                // The lookup result only exercises storage I/O.
                let _ = self.adapter.read(key.as_bytes())?;
                self.finished_single_op();
            }
            if self.config.transaction && transaction {
                self.adapter.end_transaction()?;
            }
            i += batch;
        }
        Ok(())
    }

    /// Record one completed operation: latency into histogram/raw log when
    /// collection is enabled, then progress accounting.
    fn finished_single_op(&mut self) {
        if self.config.histogram || self.config.raw {
            let now = Instant::now();
            let micros = now.duration_since(self.last_op_finish).as_secs_f64() * 1e6;
            if self.config.histogram {
                self.hist.add(micros);
                if micros > SLOW_OP_MICROS {
                    warn!("long op: {micros:.1} micros");
                }
            }
            if self.config.raw {
                self.raw.add(micros);
            }
            self.last_op_finish = now;
        }

        self.done += 1;
        if self.done >= self.next_report {
            self.next_report = advance_report_threshold(self.next_report);
            eprint!("... finished {} ops{:30}\r", self.done, "");
            let _ = io::stderr().flush();
        }
    }

    /// Emit the one-line summary (plus optional raw CSV and histogram) and
    /// record the run summary.
    fn stop_phase(&mut self, name: &str) -> BenchResult<()> {
        let elapsed = self.start.elapsed().as_secs_f64();
        if self.done < 1 {
            self.done = 1;
        }

        let mut mb_per_sec = None;
        if self.bytes > 0 {
            let rate = (self.bytes as f64 / 1_048_576.0) / elapsed;
            mb_per_sec = Some(rate);
            let tag = format!("{rate:6.1} MB/s");
            self.message = if self.message.is_empty() {
                tag
            } else {
                format!("{tag} {}", self.message)
            };
        }

        let micros_per_op = elapsed * 1e6 / self.done as f64;
        eprintln!(
            "{:<12} : {:11.3} micros/op;{}{}",
            name,
            micros_per_op,
            if self.message.is_empty() { "" } else { " " },
            self.message
        );

        if self.config.raw {
            self.raw.write_csv(io::stdout().lock())?;
        }
        if self.config.histogram {
            eprintln!("Microseconds per op:\n{}", self.hist);
        }

        let latency = self.config.histogram.then(|| LatencySnapshot {
            count: self.hist.count(),
            mean_us: self.hist.average(),
            stddev_us: self.hist.standard_deviation(),
            p50_us: self.hist.percentile(50.0),
            p75_us: self.hist.percentile(75.0),
            p99_us: self.hist.percentile(99.0),
            p999_us: self.hist.percentile(99.9),
            max_us: self.hist.max(),
        });
        self.summaries.push(RunSummary {
            name: name.to_string(),
            ops: self.done as u64,
            elapsed_secs: elapsed,
            micros_per_op,
            mb_per_sec,
            message: self.message.clone(),
            latency,
        });
        Ok(())
    }
}

/// Zero-padded fixed-width decimal key for an entry index.
fn entry_key(index: usize) -> String {
    format!("{index:0width$}", width = KEY_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryAdapter;

    fn config(benchmarks: &str, num: usize) -> BenchConfig {
        BenchConfig {
            benchmarks: benchmarks.into(),
            num,
            value_size: 100,
            ..BenchConfig::default()
        }
    }

    fn run(config: BenchConfig) -> Runner<MemoryAdapter> {
        let mut runner = Runner::new(config, MemoryAdapter::new()).unwrap();
        runner.run().unwrap();
        runner
    }

    #[test]
    fn test_report_threshold_schedule() {
        let mut threshold = FIRST_REPORT;
        let mut seen = Vec::new();
        for _ in 0..40 {
            seen.push(threshold);
            threshold = advance_report_threshold(threshold);
        }
        assert_eq!(seen[..10], [100, 200, 300, 400, 500, 600, 700, 800, 900, 1000]);
        assert_eq!(seen[10..18], [1500, 2000, 2500, 3000, 3500, 4000, 4500, 5000]);
        assert_eq!(seen[18..23], [6000, 7000, 8000, 9000, 10000]);
        assert_eq!(seen[23..31], [15000, 20000, 25000, 30000, 35000, 40000, 45000, 50000]);
        assert_eq!(seen[31..36], [60000, 70000, 80000, 90000, 100000]);
        assert_eq!(seen[36..40], [150000, 200000, 250000, 300000]);
    }

    #[test]
    fn test_fillseq_writes_sequential_padded_keys() {
        let runner = run(config("fillseq", 1000));
        let db = runner.adapter();
        assert_eq!(db.writes, 1000);
        assert_eq!(db.entry_count(), 1000);

        let keys = db.sorted_keys();
        assert_eq!(keys[0], b"0000000000000000");
        assert_eq!(keys[999], b"0000000000000999");
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(key, format!("{i:016}").as_bytes());
        }

        assert_eq!(runner.summaries().len(), 1);
        let summary = &runner.summaries()[0];
        assert_eq!(summary.name, "fillseq");
        assert_eq!(summary.ops, 1000);
        assert!(summary.mb_per_sec.is_some());
        // fillseq reopens fresh once on top of the initial open.
        assert_eq!(db.opens, 2);
        assert_eq!(db.checkpoints, 1);
    }

    #[test]
    fn test_fillrandom_keys_stay_in_range() {
        let runner = run(config("fillrandom", 500));
        let db = runner.adapter();
        assert_eq!(db.writes, 500);
        for key in db.sorted_keys() {
            let index: usize = String::from_utf8(key).unwrap().parse().unwrap();
            assert!(index < 500);
        }
    }

    #[test]
    fn test_batch_phases_bracket_transactions() {
        let runner = run(config("fillseqbatch", 2000));
        let db = runner.adapter();
        assert_eq!(db.writes, 2000);
        assert_eq!(db.transactions_begun, 2);
        assert_eq!(db.transactions_ended, 2);
    }

    #[test]
    fn test_transactions_disabled() {
        let mut cfg = config("fillseqbatch", 2000);
        cfg.transaction = false;
        let runner = run(cfg);
        let db = runner.adapter();
        assert_eq!(db.writes, 2000);
        assert_eq!(db.transactions_begun, 0);
    }

    #[test]
    fn test_sync_phase_scales_down_and_marks_durable() {
        let runner = run(config("fillseqsync", 10_000));
        let db = runner.adapter();
        assert_eq!(db.writes, 100);
        assert_eq!(db.durable_writes, 100);
        let summary = &runner.summaries()[0];
        assert!(summary.message.contains("(100 ops)"));
    }

    #[test]
    fn test_large_value_phase_wraps_generator() {
        let runner = run(config("fillseq100K", 2000));
        let db = runner.adapter();
        // num / 1000 entries of 100K values from a 100-byte generator buffer.
        assert_eq!(db.writes, 2);
        let keys = db.sorted_keys();
        assert_eq!(db.value_len(&keys[0]), Some(100_000));
    }

    #[test]
    fn test_readrandom_reads_within_range() {
        let runner = run(config("fillseq,readrandom", 300));
        let db = runner.adapter();
        assert_eq!(db.reads, 300);
        assert_eq!(db.hits, 300); // all draws fall inside the filled range
        assert_eq!(runner.summaries().len(), 2);
        assert_eq!(runner.summaries()[1].name, "readrandom");
        assert!(runner.summaries()[1].mb_per_sec.is_none());
    }

    #[test]
    fn test_readseq_touches_every_key_in_order() {
        let runner = run(config("fillseq,readseq", 200));
        let db = runner.adapter();
        assert_eq!(db.reads, 200);
        assert_eq!(db.hits, 200);
    }

    #[test]
    fn test_reads_flag_overrides_count() {
        let mut cfg = config("fillseq,readrandom", 400);
        cfg.reads = 50;
        let runner = run(cfg);
        assert_eq!(runner.adapter().reads, 50);
    }

    #[test]
    fn test_skip_when_keeping_existing_database() {
        let mut cfg = config("fillrandom", 1000);
        cfg.use_existing_db = true;
        let runner = run(cfg);
        let db = runner.adapter();
        assert_eq!(db.writes, 0);
        // No fresh reopen either: only the run-start open happened.
        assert_eq!(db.opens, 1);
        let summary = &runner.summaries()[0];
        assert!(summary.message.contains("skipping (--use-existing-db is true)"));
        assert!(summary.mb_per_sec.is_none());
    }

    #[test]
    fn test_overwrite_reuses_existing_database() {
        let runner = run(config("fillseq,overwrite", 250));
        let db = runner.adapter();
        assert_eq!(db.writes, 500);
        // fillseq reopens fresh; overwrite must not.
        assert_eq!(db.opens, 2);
        assert_eq!(db.entry_count(), 250);
    }

    #[test]
    fn test_overwritebatch_is_dispatched() {
        // overwritebatch stays in the dispatch table deliberately: a batched
        // random overwrite of the existing database, no fresh reopen.
        let runner = run(config("fillseq,overwritebatch", 2000));
        let db = runner.adapter();
        assert_eq!(db.writes, 4000);
        assert_eq!(db.opens, 2);
        assert_eq!(db.transactions_begun, 2);
        assert_eq!(runner.summaries()[1].name, "overwritebatch");
    }

    #[test]
    fn test_unknown_and_empty_names_skipped() {
        let runner = run(config("fillseq,,bogus,readseq", 100));
        assert_eq!(runner.summaries().len(), 2);
        assert_eq!(runner.summaries()[0].name, "fillseq");
        assert_eq!(runner.summaries()[1].name, "readseq");
    }

    #[test]
    fn test_histogram_collection_snapshot() {
        let mut cfg = config("fillseq", 200);
        cfg.histogram = true;
        let runner = run(cfg);
        let summary = &runner.summaries()[0];
        let latency = summary.latency.as_ref().unwrap();
        assert_eq!(latency.count, 200);
        assert!(latency.p50_us <= latency.p99_us);
        assert!(latency.p999_us <= latency.max_us);
    }

    #[test]
    fn test_deterministic_key_stream_across_runs() {
        let first = run(config("fillrandom", 400));
        let second = run(config("fillrandom", 400));
        assert_eq!(
            first.adapter().sorted_keys(),
            second.adapter().sorted_keys()
        );
    }
}
