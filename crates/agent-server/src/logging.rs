use std::io::Write;

/// Install the process logger. `RUST_LOG` wins over `filter` when set.
///
/// Both binaries log to stderr; the tool server keeps stdout for protocol
/// frames.
pub fn init_logging(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
