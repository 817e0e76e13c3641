//! Dump the bit runs of a file as CSV (`index,bit,count`).
//!
//! Useful for checking what a strategy will be fed before encoding.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use hod::io_utils::{hod_cli_error, io_cli_error};
use hod::BitRuns;

#[derive(Parser)]
struct Args {
    /// File to scan
    input: PathBuf,
    /// Stop after this many runs
    #[arg(long)]
    limit: Option<usize>,
    /// Write the CSV here instead of stdout
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Only print run totals
    #[arg(long)]
    summary: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file = File::open(&args.input)
        .map_err(|e| io_cli_error("opening input file", &args.input, e))?;

    let out: Box<dyn Write> = match &args.csv {
        Some(p) => Box::new(File::create(p).map_err(|e| io_cli_error("creating csv", p, e))?),
        None => Box::new(io::stdout().lock()),
    };
    let mut wtr = csv::Writer::from_writer(out);
    if !args.summary {
        wtr.write_record(["index", "bit", "count"])?;
    }

    let (mut runs, mut zeros, mut ones) = (0u64, 0u64, 0u64);
    for (idx, run) in BitRuns::new(file)
        .take(args.limit.unwrap_or(usize::MAX))
        .enumerate()
    {
        let run = run.map_err(|e| hod_cli_error("reading input file", e))?;
        runs += 1;
        match run.bit {
            hod::Bit::Zero => zeros += run.count,
            hod::Bit::One => ones += run.count,
        }
        if !args.summary {
            wtr.write_record(&[idx.to_string(), run.bit.to_string(), run.count.to_string()])?;
        }
    }
    wtr.flush()?;

    if args.summary || args.csv.is_some() {
        eprintln!("{runs} runs, {zeros} zero bits, {ones} one bits");
    }
    Ok(())
}
