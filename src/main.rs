//! kvbench — micro-benchmark harness for embedded key-value storage.
//!
//! Usage:
//!   kvbench                                   # full default suite
//!   kvbench --benchmarks fillseq,readrandom   # selected benchmarks
//!   kvbench --num 100000 --histogram          # smaller run, latency detail
//!   kvbench --raw > samples.csv               # raw per-op samples on stdout

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kvbench::adapters::{SqliteAdapter, StorageOptions};
use kvbench::runner::{BenchConfig, Runner};
use kvbench::{report, BenchResult, KEY_SIZE};

#[derive(Parser, Debug)]
#[command(name = "kvbench", about = "Micro-benchmark harness for embedded key-value storage")]
struct Cli {
    /// Comma-separated list of benchmarks to run, in order.
    #[arg(
        long,
        default_value = "fillseq,fillseqsync,fillseqbatch,fillrandom,fillrandsync,fillrandbatch,overwrite,overwritebatch,readrandom,readseq"
    )]
    benchmarks: String,

    /// Number of key/value pairs to place in the database.
    #[arg(long, default_value_t = 1_000_000)]
    num: usize,

    /// Number of read operations; negative means --num reads.
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    reads: i64,

    /// Size of each value in bytes.
    #[arg(long, default_value_t = 100)]
    value_size: usize,

    /// Fraction of each value that stays incompressible after compression.
    #[arg(long, default_value_t = 0.5)]
    compression_ratio: f64,

    /// Print a latency histogram after each benchmark.
    #[arg(long)]
    histogram: bool,

    /// Emit raw per-operation samples as CSV on stdout.
    #[arg(long)]
    raw: bool,

    /// Database page size in bytes.
    #[arg(long, default_value_t = 1024)]
    page_size: i64,

    /// Page cache size, in pages.
    #[arg(long, default_value_t = 4096)]
    num_pages: i64,

    /// Keep the existing database; benchmarks needing a fresh one are
    /// skipped.
    #[arg(long)]
    use_existing_db: bool,

    /// Disable transaction bracketing for batched phases.
    #[arg(long)]
    no_transaction: bool,

    /// Disable write-ahead logging.
    #[arg(long)]
    no_wal: bool,

    /// Directory that holds the benchmark database files.
    #[arg(long, default_value = ".")]
    db: PathBuf,

    /// Directory to export the suite summary into (CSV + JSON).
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run() -> BenchResult<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = BenchConfig {
        benchmarks: cli.benchmarks.clone(),
        num: cli.num,
        reads: cli.reads,
        value_size: cli.value_size,
        compression_ratio: cli.compression_ratio,
        histogram: cli.histogram,
        raw: cli.raw,
        use_existing_db: cli.use_existing_db,
        transaction: !cli.no_transaction,
    };
    config.validate()?;
    print_header(&config);

    let adapter = SqliteAdapter::new(StorageOptions {
        dir: cli.db,
        cache_pages: cli.num_pages,
        page_size: cli.page_size,
        wal: !cli.no_wal,
        use_existing: cli.use_existing_db,
    })?;

    let mut runner = Runner::new(config, adapter)?;
    runner.run()?;

    report::print_suite(runner.summaries());
    if let Some(dir) = cli.export {
        fs::create_dir_all(&dir)?;
        report::export_csv(runner.summaries(), &dir.join("kvbench_results.csv"))?;
        report::export_json(runner.summaries(), &dir.join("kvbench_results.json"))?;
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_header(config: &BenchConfig) {
    let cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    eprintln!(
        "{}",
        "kvbench — embedded key-value storage micro-benchmark".bold()
    );
    eprintln!(
        "Host:       {} {} ({} cpus)",
        std::env::consts::OS,
        std::env::consts::ARCH,
        cpus
    );
    eprintln!("Keys:       {KEY_SIZE} bytes each");
    eprintln!("Values:     {} bytes each", config.value_size);
    eprintln!("Entries:    {}", config.num);
    eprintln!(
        "RawSize:    {:.1} MB (estimated)",
        ((KEY_SIZE + config.value_size) * config.num) as f64 / 1_048_576.0
    );
    eprintln!("------------------------------------------------");
}
