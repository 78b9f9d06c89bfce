//! End-of-run suite reporting: comparison table on the terminal, CSV and
//! JSON exports for downstream tooling.

use std::fs;
use std::path::Path;

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Table};

use crate::{BenchResult, RunSummary};

/// Print a summary table of all completed benchmarks. Goes to stderr with
/// the rest of the human-readable output; stdout is reserved for raw CSV.
pub fn print_suite(results: &[RunSummary]) {
    if results.is_empty() {
        return;
    }

    eprintln!("\n{}", "── Suite summary ──".bold().cyan());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec![
        "Benchmark",
        "Ops",
        "Micros/op",
        "MB/s",
        "p50 (μs)",
        "p99 (μs)",
        "Message",
    ]);

    for r in results {
        table.add_row(vec![
            Cell::new(&r.name),
            Cell::new(r.ops),
            Cell::new(format!("{:.3}", r.micros_per_op)),
            Cell::new(
                r.mb_per_sec
                    .map(|v| format!("{v:.1}"))
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(
                r.latency
                    .as_ref()
                    .map(|l| format!("{:.1}", l.p50_us))
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(
                r.latency
                    .as_ref()
                    .map(|l| format!("{:.1}", l.p99_us))
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(&r.message),
        ]);
    }

    eprintln!("{table}");
}

pub fn export_csv(results: &[RunSummary], path: &Path) -> BenchResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "benchmark",
        "ops",
        "elapsed_secs",
        "micros_per_op",
        "mb_per_sec",
        "message",
    ])?;
    for r in results {
        writer.write_record([
            r.name.clone(),
            r.ops.to_string(),
            format!("{:.6}", r.elapsed_secs),
            format!("{:.3}", r.micros_per_op),
            r.mb_per_sec.map(|v| format!("{v:.2}")).unwrap_or_default(),
            r.message.clone(),
        ])?;
    }
    writer.flush()?;
    eprintln!("CSV exported to {}", path.display());
    Ok(())
}

pub fn export_json(results: &[RunSummary], path: &Path) -> BenchResult<()> {
    let json = serde_json::to_string_pretty(results)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    fs::write(path, json)?;
    eprintln!("JSON exported to {}", path.display());
    Ok(())
}
