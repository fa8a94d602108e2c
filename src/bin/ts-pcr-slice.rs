//! PCR indexer/slicer CLI: builds or loads a persistent byte-offset ↔ PCR
//! index for a TS file, dumps it, answers fast duration queries, or slices
//! a byte range out of the file by stream time.

use clap::Parser;
use log::info;

use tspcr::config::SlicerConfig;
use tspcr::index::{indexer, query, slicer};

/// MPEG-TS PCR indexer and byte-exact slicer.
#[derive(Parser)]
#[command(name = "ts-pcr-slice")]
#[command(about = "Build/query a PCR index and slice MPEG-TS files by time", long_about = None)]
struct Args {
    /// Required input file.
    #[arg(short = 'i')]
    input: String,

    /// Output file for a slice.
    #[arg(short = 'o')]
    output: Option<String>,

    /// Start time bound, `D.HH:MM:SS.mmm`.
    #[arg(short = 's')]
    start: Option<String>,

    /// End time bound, `D.HH:MM:SS.mmm`.
    #[arg(short = 'e')]
    end: Option<String>,

    /// Dump the index to stdout.
    #[arg(short = 'l', default_value_t = false)]
    dump_index: bool,

    /// Fast duration query: scans only the head/tail of the given TS file.
    #[arg(short = 'q')]
    fast_query: Option<String>,

    /// SCR PID used by `-q`, e.g. `0x31`.
    #[arg(short = 'S', value_parser = parse_pid)]
    scr_pid: Option<u16>,
}

fn parse_pid(s: &str) -> Result<u16, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let scr_pid = args.scr_pid.unwrap_or(tspcr::config::DEFAULT_SCR_PID);

    let config = match SlicerConfig::from_args(
        &args.input,
        args.output,
        args.start,
        args.end,
        args.dump_index,
        args.fast_query,
    ) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config, scr_pid) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(config: SlicerConfig, scr_pid: u16) -> tspcr::error::Result<()> {
    if let Some(fast_query_path) = &config.fast_query {
        // Scans only the head/tail 16 MiB of the raw TS file; never reads
        // the middle, regardless of file size.
        let duration = query::fast_query_duration(fast_query_path, scr_pid)?;
        println!("duration_ticks={duration}");
        return Ok(());
    }

    let records = indexer::load_or_build(&config.input, scr_pid)?;
    info!("loaded {} PCR records for {}", records.len(), config.input.display());

    if config.dump_index {
        for record in &records {
            println!("{} {}", record.byte_offset, record.pcr_27mhz);
        }
    }

    if config.start.is_some() || config.end.is_some() {
        let output = config
            .output
            .clone()
            .unwrap_or_else(|| config.input.with_extension("sliced.ts"));
        let written = slicer::slice_by_time(
            &config.input,
            &output,
            &records,
            config.start.as_deref(),
            config.end.as_deref(),
        )?;
        info!("wrote {written} bytes to {}", output.display());
    }

    Ok(())
}
