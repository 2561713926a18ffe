// Log setup for the idxsync binary
use log::LevelFilter;
use std::io::Write;

/// HTTP stack modules that stay at Info even with --verbose
const QUIET_DEPENDENCIES: [&str; 3] = ["reqwest", "hyper", "h2"];

/// Install the global logger.
///
/// `RUST_LOG`, when set, wins over both flags.
pub fn init_logger(verbose: bool, quiet: bool) {
    if std::env::var_os("RUST_LOG").is_some() {
        return env_logger::init();
    }

    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, true) => LevelFilter::Debug,
        (false, false) => LevelFilter::Warn,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.min(LevelFilter::Warn));
    builder.filter_module("idxsync", level);
    // the spinner already shows these
    builder.filter_module("idxsync::progress", LevelFilter::Off);
    if verbose && !quiet {
        for module in QUIET_DEPENDENCIES {
            builder.filter_module(module, LevelFilter::Info);
        }
    }

    builder.format(move |buf, record| {
        let stamp = if verbose {
            format!("{} ", chrono::Local::now().format("%H:%M:%S%.3f"))
        } else {
            String::new()
        };
        if record.level() <= log::Level::Warn {
            writeln!(buf, "{}[{}] {}", stamp, record.level(), record.args())
        } else {
            writeln!(buf, "{}{}", stamp, record.args())
        }
    });

    builder.init();
}
