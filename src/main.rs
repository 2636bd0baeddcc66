use anyhow::{Context, Result};
use clap::Parser;
use interpose::cli::{Cli, OutputFormat};
use interpose::collector::RecordCollector;
use interpose::config::InstrumentationConfig;
use interpose::dispatch::DispatchTable;
use interpose::json_output::JsonReport;
use interpose::record::InstrumentationRecord;
use interpose::stats::StatsAggregator;
use interpose::{demo, instrumentation};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DRAIN_BATCH: usize = 1024;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(args: &Cli) -> Result<InstrumentationConfig> {
    let mut config = match &args.config {
        Some(path) => InstrumentationConfig::from_toml(path)?,
        None => InstrumentationConfig::default(),
    };
    if config.targets.is_empty() {
        config.targets = demo::calculator_operations();
    }
    if args.disable {
        config.enabled_by_default = false;
    }
    if args.capture_args {
        config.capture_arguments = true;
    }
    Ok(config)
}

/// Run the workload on `threads` threads while draining the collector
fn run_workload(
    table: &DispatchTable,
    collector: &RecordCollector,
    threads: usize,
    iterations: u64,
    keep_records: bool,
) -> Result<(i64, StatsAggregator, Vec<InstrumentationRecord>)> {
    let mut stats = StatsAggregator::new();
    let mut records = Vec::new();
    let mut absorb = |batch: Vec<InstrumentationRecord>| {
        stats.extend(&batch);
        if keep_records {
            records.extend(batch);
        }
    };

    let checksum = thread::scope(|scope| -> Result<i64> {
        let handles: Vec<_> = (0..threads)
            .map(|_| scope.spawn(|| demo::run_workload(table, iterations)))
            .collect();

        while handles.iter().any(|h| !h.is_finished()) {
            let batch = collector.drain(DRAIN_BATCH);
            if batch.is_empty() {
                thread::sleep(Duration::from_millis(1));
            }
            absorb(batch);
        }

        let mut checksum = 0i64;
        for handle in handles {
            let result = handle
                .join()
                .map_err(|_| anyhow::anyhow!("workload thread panicked"))?;
            checksum = checksum
                .checked_add(result.context("workload failed")?)
                .context("checksum overflows i64")?;
        }
        Ok(checksum)
    })?;

    absorb(collector.drain_all());
    Ok((checksum, stats, records))
}

fn main() -> Result<()> {
    let args = Cli::parse();

    if args.threads == 0 {
        anyhow::bail!("Invalid value for --threads: 0 (must be >= 1)");
    }

    init_tracing(args.debug);

    let config = load_config(&args)?;

    let table = DispatchTable::global();
    demo::define_calculator(&table)?;

    let collector = Arc::new(
        RecordCollector::new(config.collector_capacity)
            .with_slow_call_threshold(config.slow_call_threshold_us())
            .with_argument_capture(config.capture_arguments),
    );
    let interceptors = instrumentation::time_targets(&table, &config, &collector)?;
    tracing::info!(
        interceptors = interceptors.len(),
        enabled = config.enabled_by_default,
        "running workload"
    );

    let (checksum, stats, records) =
        run_workload(&table, &collector, args.threads, args.iterations, args.records)?;

    drop(interceptors);
    table.reset();

    let dropped = collector.stats().total_dropped;
    match args.format {
        OutputFormat::Text => {
            println!("Checksum: {}", checksum);
            println!("Dropped records: {}", dropped);
            stats.print_summary();
        }
        OutputFormat::Json => {
            let mut report = JsonReport::from_stats(&stats);
            report.set_dropped_records(dropped);
            for record in records {
                report.add_record(record);
            }
            println!("{}", report.to_json()?);
        }
    }

    Ok(())
}
