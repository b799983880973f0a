//! Backend selection for the `log` facade. Daemonized runs talk to syslog at
//! the priorities spec.md §7 requires; `--foreground` runs fall back to
//! stderr so the operator sees the same lines on their terminal.

use log::LevelFilter;

pub fn init(foreground: bool, verbosity: u8) -> anyhow::Result<()> {
    let level = level_filter_for(verbosity);

    if foreground {
        env_logger::Builder::new().filter_level(level).init();
        return Ok(());
    }

    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_DAEMON,
        hostname: None,
        process: "6lowpand".into(),
        pid: std::process::id(),
    };
    let logger = syslog::unix(formatter).map_err(|e| anyhow::anyhow!("couldn't connect to syslog: {e}"))?;
    log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
        .map(|()| log::set_max_level(level))
        .map_err(|e| anyhow::anyhow!("couldn't install syslog logger: {e}"))
}

/// Maps the CLI's 0..7 syslog-priority floor onto a `log::LevelFilter`.
/// EMERG..WARNING collapse to `Warn`, NOTICE/INFO to `Info`, DEBUG to `Debug`.
fn level_filter_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0..=4 => LevelFilter::Warn,
        5..=6 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}
