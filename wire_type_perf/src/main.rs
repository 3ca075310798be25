use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::Parser;
use log::LevelFilter;
use log4rs::config::Root;
use rand::prelude::*;
use wire_type::WireReader;

mod config;
mod logging;
mod samples;
mod stats;

use config::{PerfConfig, RunConfig};
use samples::{Complex, Person};
use stats::VarintStats;

/// Measures the varint encoding and round-trips sample records through a file.
#[derive(Debug, Parser)]
struct Cli {
    /// An additional TOML config file.
    ///
    /// It's loaded after `wire_type_perf.toml` and before environment
    /// variables prefixed with `WIRE_PERF__`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the random values.
    #[arg(long)]
    seed: Option<u64>,

    /// The number of random values measured per varint type.
    #[arg(short, long)]
    samples: Option<u32>,

    /// The number of leaf records in the round-trip record.
    #[arg(short, long)]
    leaves: Option<u32>,

    /// The file the record is written to and read back from.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log what the codec skips while reading.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let res = run(cli);
    if let Err(why) = &res {
        log::error!("Exiting due to error: {why:?}");
    }

    log::logger().flush();
    res
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    init_logging(config.log, cli.verbose)?;

    let run = config.perf;
    log::info!("wire_type_perf v{} (seed {})", env!("CARGO_PKG_VERSION"), run.seed);

    let mut rng = StdRng::seed_from_u64(run.seed);
    report_varints(&varint_stats(&mut rng, run.samples)?);

    round_trip_complex(&mut rng, &run)?;
    round_trip_person(&mut rng)?;
    Ok(())
}

fn build_config(cli: &Cli) -> Result<PerfConfig> {
    use crate::config::setup::{Builder, Env, File, TomlText};

    let default_config = include_str!("../assets/default_config.toml");

    let mut builder = Builder::new()
        .add_layer(TomlText::new(default_config))
        .add_layer(File::new("wire_type_perf.toml").required(false));

    if let Some(path) = &cli.config {
        builder = builder.add_layer(File::new(path));
    }

    let mut config: PerfConfig = builder.add_layer(Env::new("WIRE_PERF__")).build()?;

    let run = &mut config.perf;
    if let Some(seed) = cli.seed {
        run.seed = seed;
    }
    if let Some(samples) = cli.samples {
        run.samples = samples;
    }
    if let Some(leaves) = cli.leaves {
        run.leaves = leaves;
    }
    if let Some(output) = &cli.output {
        run.output.clone_from(output);
    }

    Ok(config)
}

fn init_logging(config: log4rs::config::RawConfig, verbose: bool) -> Result<()> {
    let deserializers = logging::deserializers();
    let (appenders, errors) = config.appenders_lossy(&deserializers);
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let config = log4rs::Config::builder()
        .appenders(appenders)
        .loggers(config.loggers())
        .build(root_for(config.root(), verbose))?;

    log4rs::init_config(config)?;
    Ok(())
}

/// Raises the root logger to at least debug level when `verbose` is set.
fn root_for(root: Root, verbose: bool) -> Root {
    if verbose && root.level() < LevelFilter::Debug {
        Root::builder()
            .appenders(root.appenders().iter().cloned())
            .build(LevelFilter::Debug)
    } else {
        root
    }
}

/// Splits a sample index into two factors in `1..=1023`.
fn factors(index: u32) -> (u32, u32) {
    (index / 1023 + 1, index % 1023 + 1)
}

fn varint_stats(rng: &mut StdRng, samples: u32) -> Result<Vec<VarintStats>> {
    let product = |index| {
        let (x, i) = factors(index);
        (x.wrapping_mul(i), i % 2 == 0)
    };

    let i32s = stats::measure("i32", samples, |index| {
        let (n, negate) = product(index);
        let n = n.cast_signed();
        if negate { n.wrapping_neg() } else { n }
    })?;

    let i64s = stats::measure("i64", samples, |index| {
        let (n, negate) = product(index);
        let mut value = i64::from(rng.random_range(0..i32::MAX));
        if index % 3 == 0 {
            value = (value << 32).wrapping_add(i64::from(n));
        }
        if negate { -value } else { value }
    })?;

    let u32s = stats::measure("u32", samples, |index| product(index).0)?;

    let u64s = stats::measure("u64", samples, |index| {
        let (n, shift) = product(index);
        let value = u64::from(n);
        if shift {
            (value << 32) + u64::from(rng.random::<u32>())
        } else {
            value
        }
    })?;

    let f32s = stats::measure("f32", samples, |_| rng.random::<f32>())?;
    let f64s = stats::measure("f64", samples, |_| rng.random_range(-1e6..1e6))?;

    Ok(vec![i32s, i64s, u32s, u64s, f32s, f64s])
}

fn report_varints(all: &[VarintStats]) {
    let mut count = 0u64;
    let mut saved = 0u64;
    let mut wasted = 0u64;
    let mut elapsed = Duration::ZERO;

    for stats in all {
        log::info!("{stats}, {:.2} bytes on average", stats.average_len());
        count += stats.count;
        saved += stats.saved;
        wasted += stats.wasted;
        elapsed += stats.elapsed;
    }

    log::info!("{count} values encoded in {elapsed:.2?}.");
    log::info!("{saved} bytes saved, {wasted} bytes wasted.");
}

fn round_trip_complex(rng: &mut StdRng, run: &RunConfig) -> Result<()> {
    let value = samples::complex(rng, run.leaves, run.floats);

    let start = Instant::now();
    let file = fs::File::create(&run.output)
        .with_context(|| format!("cannot create {:?}", run.output))?;
    wire_type::to_writer(BufWriter::new(file), &value)
        .with_context(|| format!("failed to write {:?}", run.output))?;
    let write_time = start.elapsed();

    let size = fs::metadata(&run.output)
        .with_context(|| format!("cannot stat {:?}", run.output))?
        .len();

    let start = Instant::now();
    let file = fs::File::open(&run.output)
        .with_context(|| format!("cannot open {:?}", run.output))?;
    let rev: Complex = WireReader::new(file)
        .read_message()
        .with_context(|| format!("failed to read {:?}", run.output))?;
    let read_time = start.elapsed();

    anyhow::ensure!(rev == value, "record read from {:?} differs", run.output);

    log::info!("{} leaves, {size} bytes in {:?}.", run.leaves, run.output);
    log::info!("{write_time:.2?} to serialize, {read_time:.2?} to deserialize.");

    if run.clean_up {
        fs::remove_file(&run.output)
            .with_context(|| format!("cannot remove {:?}", run.output))?;
    }

    Ok(())
}

fn round_trip_person(rng: &mut StdRng) -> Result<()> {
    let value = samples::person(rng);

    let buf = wire_type::to_vec(&value)?;
    let rev: Person = wire_type::from_slice(&buf)?;
    anyhow::ensure!(rev == value, "person differs after the round trip");

    log::info!("Person with ancestors: {} bytes.", buf.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_root_level() {
        let root = Root::builder().appender("console").build(LevelFilter::Info);
        let root = root_for(root, true);
        assert_eq!(root.level(), LevelFilter::Debug, "raised to debug");
        assert_eq!(root.appenders(), ["console"], "appenders kept");
    }

    #[test]
    fn quiet_keeps_root_level() {
        let root = Root::builder().appender("console").build(LevelFilter::Warn);
        assert_eq!(root_for(root, false).level(), LevelFilter::Warn, "configured level kept");

        let root = Root::builder().build(LevelFilter::Trace);
        assert_eq!(root_for(root, true).level(), LevelFilter::Trace, "never lowered");
    }

    #[test]
    fn factor_range() {
        assert_eq!(factors(0), (1, 1), "first");
        assert_eq!(factors(1022), (1, 1023), "end of the first row");
        assert_eq!(factors(1023), (2, 1), "start of the second row");
        assert_eq!(factors(1023 * 1023 - 1), (1023, 1023), "last default sample");
    }

    #[test]
    fn default_config_parses() {
        use crate::config::setup::{Builder, TomlText};

        let config: PerfConfig = Builder::new()
            .add_layer(TomlText::new(include_str!("../assets/default_config.toml")))
            .build()
            .expect("defaults must deserialize");

        assert_eq!(config.perf.samples, 1023 * 1023, "sample count");
        assert_eq!(config.perf.leaves, 100, "leaf count");
        assert!(!config.perf.clean_up, "file is kept");
    }

    #[test]
    fn all_varint_types_measured() {
        let mut rng = StdRng::seed_from_u64(7);
        let all = varint_stats(&mut rng, 2048).expect("must round-trip");

        let names: Vec<_> = all.iter().map(|s| s.name).collect();
        assert_eq!(names, ["i32", "i64", "u32", "u64", "f32", "f64"], "every type");
        assert!(all.iter().all(|s| s.count == 2048), "every sample counted");
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from(["wire_type_perf", "-s", "10", "--seed", "5", "-v"])
            .expect("valid args");

        assert_eq!(cli.samples, Some(10), "samples");
        assert_eq!(cli.seed, Some(5), "seed");
        assert!(cli.verbose, "verbose");
        assert!(cli.output.is_none(), "output not set");
    }
}
