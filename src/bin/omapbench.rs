use clap::{CommandFactory, Parser};
use log::{debug, error, info, LevelFilter};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use omapbench::benchmark::{
    parse_non_negative, parse_positive, parse_size, parse_think_time, BenchmarkConfig,
    OperationType,
};
use omapbench::config::{default_config, ClusterConfig};
use omapbench::progress::RunProgress;
use omapbench::runner::BatchWriteRunner;
use omapbench::session::{connect, StorageSession};
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

fn main() {
    let opt = match Opt::try_parse() {
        Ok(opt) => opt,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => fail(&e),
    };

    if let Err(e) = run(&opt) {
        error!("{}", e);
        fail(&e);
    }
}

fn fail(e: &dyn Display) -> ! {
    eprint!("{}", error_message(e));
    std::process::exit(1);
}

// The error, followed by how to use the program.
fn error_message(e: &dyn Display) -> String {
    let msg = e.to_string();
    let msg = msg.trim_end();
    let msg = msg.strip_prefix("error: ").unwrap_or(msg);
    format!("ERROR: {}\n\n{}\n", msg, Opt::command().render_usage())
}

fn run(opt: &Opt) -> anyhow::Result<()> {
    let bench = BenchmarkConfig::new(
        opt.operation,
        opt.kvpairs_per_call,
        opt.total_kvpairs,
        opt.value_size,
        std::env::var_os("DEBUG").is_some(),
    )?
    .with_think_time(opt.think_time);

    let config_file = match opt.config {
        None => default_config(),
        Some(ref path) => path.to_path_buf(),
    };
    let cluster = ClusterConfig::read(&config_file)?;
    setup_logging(&cluster.log)?;

    info!("omapbench starts");
    debug!("{:?}", opt);
    debug!("{:#?}", cluster);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for line in bench.summary() {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;

    let mut session = connect(&cluster)?;
    let mut runner = BatchWriteRunner::new(&bench, &cluster.object);
    if opt.progress {
        runner = runner.with_progress(RunProgress::new(bench.planned_pairs(), true));
    }

    runner.setup(&mut session)?;
    let elapsed = runner.run(&mut session, &mut out)?;
    writeln!(out, "elapsed time = {} sec", elapsed)?;
    out.flush()?;

    runner.performance().log();
    log_map_len(&session, &cluster.object);
    session.close();

    info!("omapbench ends successfully");
    Ok(())
}

// Log how many entries the object's map has. The run is already
// over, so failing to count is only logged.
fn log_map_len<S: StorageSession>(session: &S, object: &str) -> Option<u64> {
    match session.map_len(object) {
        Ok(entries) => {
            info!("object {} has {} map entries", object, entries);
            Some(entries)
        }
        Err(e) => {
            error!("cannot count map entries of {}: {}", object, e);
            None
        }
    }
}

#[derive(Debug, Parser)]
#[clap(
    name = "omapbench",
    about = "Benchmark bulk writes into an object's key-value map"
)]
struct Opt {
    /// Operation to measure: read or write.
    #[clap(
        long,
        default_value = "write",
        value_parser = OperationType::from_str,
        allow_hyphen_values = true
    )]
    operation: OperationType,

    /// Number of key-value pairs in each atomic map write.
    #[clap(
        long,
        default_value = "1",
        value_parser = parse_positive,
        allow_hyphen_values = true
    )]
    kvpairs_per_call: usize,

    /// Number of key-value pairs to write in total.
    #[clap(
        long,
        default_value = "10",
        value_parser = parse_non_negative,
        allow_hyphen_values = true
    )]
    total_kvpairs: u64,

    /// Size of each value, in bytes.
    #[clap(
        long,
        default_value = "2",
        value_parser = parse_size,
        allow_hyphen_values = true
    )]
    value_size: usize,

    /// Seconds to pause after each batch, such as 0.25.
    #[clap(
        long,
        default_value = "0",
        value_parser = parse_think_time,
        allow_hyphen_values = true
    )]
    think_time: Duration,

    /// Cluster configuration file.
    #[clap(long, short, value_parser)]
    config: Option<PathBuf>,

    /// Show a progress bar on stderr.
    #[clap(long, action)]
    progress: bool,
}

fn setup_logging(filename: &Path) -> anyhow::Result<()> {
    let logfile = FileAppender::builder().build(filename)?;

    let config = Config::builder()
        .appender(Appender::builder().build("omapbench", Box::new(logfile)))
        .logger(Logger::builder().build("omapbench", LevelFilter::Debug))
        .build(Root::builder().appender("omapbench").build(LevelFilter::Debug))?;

    log4rs::init_config(config)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::{error_message, log_map_len, Opt};
    use clap::error::ErrorKind;
    use clap::Parser;
    use omapbench::generator::generate;
    use omapbench::session::{LocalSession, StorageSession};
    use std::time::Duration;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Result<Opt, clap::Error> {
        Opt::try_parse_from(std::iter::once("omapbench").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let opt = parse(&[]).unwrap();
        assert_eq!(opt.kvpairs_per_call, 1);
        assert_eq!(opt.total_kvpairs, 10);
        assert_eq!(opt.value_size, 2);
        assert_eq!(opt.think_time, Duration::ZERO);
        assert!(opt.config.is_none());
    }

    #[test]
    fn negative_values_reach_validation() {
        let err = parse(&["--kvpairs-per-call", "-3"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        let err = parse(&["--total-kvpairs", "-1"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn zero_only_as_plain_zero() {
        assert!(parse(&["--kvpairs-per-call", "0"]).is_err());
        assert!(parse(&["--total-kvpairs", "00"]).is_err());
        assert_eq!(parse(&["--total-kvpairs", "0"]).unwrap().total_kvpairs, 0);
    }

    #[test]
    fn missing_value_is_an_error() {
        assert!(parse(&["--value-size"]).is_err());
    }

    #[test]
    fn parses_think_time() {
        let opt = parse(&["--think-time", "0.5"]).unwrap();
        assert_eq!(opt.think_time, Duration::from_millis(500));
        assert!(parse(&["--think-time", "-1"]).is_err());
    }

    #[test]
    fn bad_value_message_has_usage() {
        let err = parse(&["--kvpairs-per-call", "-3"]).unwrap_err();
        let msg = error_message(&err);
        assert!(msg.starts_with("ERROR: "));
        assert!(msg.contains("-3"));
        assert!(msg.contains("omapbench [OPTIONS]"));
    }

    #[test]
    fn failed_map_count_is_not_fatal() {
        let dir = tempdir().unwrap();
        let mut session = LocalSession::open(&dir.path().join("store.db"), "ben").unwrap();
        session
            .atomic_map_write("hw", generate(3, 0, 1).unwrap())
            .unwrap();
        assert_eq!(log_map_len(&session, "hw"), Some(3));
        session.close();
        assert_eq!(log_map_len(&session, "hw"), None);
    }
}
