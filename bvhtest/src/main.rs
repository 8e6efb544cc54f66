//! Command line entry point.
//!
//! Records go to stdout, one line each; logs go to stderr (set `RUST_LOG`).

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use bvh_rs::Bvh;
use bvhtest::{run, BenchConfig, BenchError, LineSink, Mode, RunSummary};
use clap::Parser;

/// Upper bound on the node reservation made before a run; larger runs grow
/// the arena as they go.
const PREALLOC_ITEMS: usize = 1 << 22;

#[derive(Parser, Debug)]
#[command(name = "bvhtest")]
#[command(about = "Time BVH insertions, removals and queries under a seeded random workload")]
struct Args {
    /// JSON configuration for the test
    #[arg(long, default_value = "testBVH.json")]
    config: PathBuf,

    /// Only insert, printing step, depth and score after each insertion
    #[arg(long, default_value_t = false)]
    compare: bool,
}

impl Args {
    fn mode(&self) -> Mode {
        if self.compare {
            Mode::Comparison
        } else {
            Mode::Benchmark
        }
    }
}

/// Load, validate and run, writing records to `out`.
fn execute<W: Write>(args: &Args, out: W) -> Result<RunSummary, BenchError> {
    let config = BenchConfig::load(&args.config)?;
    let mode = args.mode();
    mode.validate(&config)?;
    log::info!(
        "{:?} run: {} additions, {} removals, {} queries, seed {}",
        mode,
        config.additions,
        config.removals,
        config.queries,
        config.rand_seed
    );

    let mut index: Bvh<usize> = Bvh::with_capacity(config.additions.min(PREALLOC_ITEMS));
    let mut sink = LineSink::new(out);
    run(&config, mode, &mut index, &mut sink)
}

/// Print `err` where it belongs and return the exit status.
fn report<O: Write, E: Write>(err: &BenchError, out: &mut O, diag: &mut E) -> u8 {
    let written = match err {
        // Config problems are printed inline with the record stream.
        BenchError::Config(inner) => writeln!(out, "{inner}").and_then(|()| out.flush()),
        other => writeln!(diag, "{other}"),
    };
    if let Err(e) = written {
        log::warn!("could not report failure: {e}");
    }
    log::error!("{err}");
    err.exit_code()
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match execute(&args, io::stdout().lock()) {
        Ok(summary) => {
            summary.log();
            ExitCode::SUCCESS
        }
        Err(err) => ExitCode::from(report(&err, &mut io::stdout(), &mut io::stderr())),
    }
}
