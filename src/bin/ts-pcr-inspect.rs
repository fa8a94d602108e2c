//! Clock-inspector CLI: streams a TS source and reports PCR/PTS/DTS timing
//! conformance against wallclock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};

use tspcr::config::{InspectorConfig, SourceUrl};
use tspcr::inspector::pipeline::Pipeline;
use tspcr::inspector::trend_reporter::TrendReporter;
use tspcr::source::{FileSource, PacketSource, ReadOutcome, UdpSource};
use tspcr::ts::packet::PACKET_SIZE;

/// Streaming MPEG-TS clock inspector: PCR/PTS/DTS timing conformance.
#[derive(Parser)]
#[command(name = "ts-pcr-inspect")]
#[command(about = "Inspect PCR/PTS/DTS timing conformance in an MPEG-TS stream", long_about = None)]
struct Args {
    /// Input: file path or `udp://host:port`.
    #[arg(short = 'i')]
    input: String,

    /// Initial wallclock anchor, `YYYYMMDDHHMMSS`.
    #[arg(short = 'T')]
    wallclock_anchor: Option<String>,

    /// Hex-dump packets on this PID (repeatable).
    #[arg(short = 'd', value_parser = parse_pid)]
    hex_dump: Vec<u16>,

    /// Enable SCR stats.
    #[arg(short = 's', default_value_t = false)]
    scr_stats: bool,

    /// SCR PID, e.g. `0x31`.
    #[arg(short = 'S', value_parser = parse_pid)]
    scr_pid: Option<u16>,

    /// Track PTS/DTS on this PID (repeatable).
    #[arg(short = 'p', value_parser = parse_pid)]
    pts_dts: Vec<u16>,

    /// Drift threshold in milliseconds.
    #[arg(short = 'D')]
    drift_threshold_ms: Option<i64>,

    /// Buffer and reorder PTS by value.
    #[arg(short = 'R', default_value_t = false)]
    reorder_pts: bool,

    /// Print a progress indicator.
    #[arg(short = 'P', default_value_t = false)]
    progress: bool,

    /// Suppress conformance warnings.
    #[arg(short = 'Z', default_value_t = false)]
    suppress_conformance: bool,

    /// Emit periodic trend reports for this PID (repeatable).
    #[arg(short = 'L', value_parser = parse_pid)]
    trend_report: Vec<u16>,

    /// Emit PES delivery-span reports.
    #[arg(short = 'Y', default_value_t = false)]
    pes_delivery_report: bool,

    /// Stop after N seconds.
    #[arg(short = 't')]
    stop_after_seconds: Option<u64>,

    /// Trend window size in samples.
    #[arg(short = 'A')]
    trend_capacity: Option<usize>,

    /// Trend report period in seconds.
    #[arg(short = 'B')]
    report_period_seconds: Option<u64>,

    /// Trend-report verbosity: repeat for more (`-v` CSV persistence, `-vv`
    /// also dumps every raw sample to the console).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    trend_verbosity: u8,
}

fn parse_pid(s: &str) -> Result<u16, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match InspectorConfig::from_args(
        &args.input,
        args.wallclock_anchor,
        args.hex_dump,
        args.scr_stats,
        args.scr_pid,
        args.pts_dts,
        args.drift_threshold_ms,
        args.reorder_pts,
        args.progress,
        args.suppress_conformance,
        args.trend_report,
        args.pes_delivery_report,
        args.stop_after_seconds,
        args.trend_capacity,
        args.report_period_seconds,
        Some(args.trend_verbosity + 1),
    ) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: InspectorConfig) -> tspcr::error::Result<()> {
    let source_desc = config.source.clone();
    let mut source: Box<dyn PacketSource> = match &source_desc {
        SourceUrl::File(path) => Box::new(FileSource::open(path).await?),
        SourceUrl::Udp { host, port } => Box::new(UdpSource::bind(host, *port).await?),
    };
    info!("ts-pcr-inspect starting on {source_desc:?}");

    let trend_pids = config.trend_report_pids.clone();
    let report_period = config.report_period_seconds;
    let trend_verbosity = config.trend_verbosity;
    let stop_after = config.stop_after_seconds;

    let mut pipeline = Pipeline::new(config);
    // Extracted as owned `Arc<Mutex<LinearTrend>>` handles, so the borrow of
    // `pipeline.table()` ends here; the reporter shares no further lifetime
    // with the ingest loop below.
    let reporter = TrendReporter::new(pipeline.table(), &trend_pids, report_period, trend_verbosity);

    let running = Arc::new(AtomicBool::new(true));
    let signal_running = running.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_running.store(false, Ordering::Relaxed);
        }
    });

    let start = tokio::time::Instant::now();

    // The reporter is the second cooperative task: it wakes every 250ms and
    // fires a report on the `-B` period boundary, sharing `running` with the
    // ingest loop below so both wind down together.
    let reporter_running = running.clone();
    let reporter_task = tokio::spawn(async move {
        reporter
            .run(reporter_running, move || start.elapsed().as_millis() as i64, |line| println!("{line}"))
            .await;
        reporter
    });

    let mut buf = vec![0u8; PACKET_SIZE * 256];

    'ingest: while running.load(Ordering::Relaxed) {
        match source.read(&mut buf).await {
            Ok(ReadOutcome::Bytes(n)) => {
                for chunk in buf[..n].chunks_exact(PACKET_SIZE) {
                    let now_us = start.elapsed().as_micros() as i64;
                    for line in pipeline.process_packet(chunk, now_us) {
                        println!("{line}");
                    }
                    if let Some(limit) = stop_after {
                        if pipeline.elapsed_seconds(now_us).unwrap_or(0) >= limit {
                            break 'ingest;
                        }
                    }
                }
            }
            Ok(ReadOutcome::WouldBlock) => {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            Ok(ReadOutcome::Eof) => break,
            Err(e) => {
                warn!("source read error: {e}");
                running.store(false, Ordering::Relaxed);
                let _ = reporter_task.await;
                return Err(e);
            }
        }
    }

    // Ingest waits for the reporter task to notice `running` went false and
    // exit before the final flush, so the two tasks never race on stdout.
    running.store(false, Ordering::Relaxed);
    let reporter = match reporter_task.await {
        Ok(reporter) => reporter,
        Err(e) => {
            warn!("trend reporter task panicked: {e}");
            return Err(tspcr::error::TsPcrError::Config(format!("trend reporter task panicked: {e}")));
        }
    };
    reporter.emit_once(start.elapsed().as_millis() as i64, &mut |line| println!("{line}"));
    for line in pipeline.drain_ordered_pts_lines() {
        println!("{line}");
    }
    info!("ts-pcr-inspect finished");
    Ok(())
}
